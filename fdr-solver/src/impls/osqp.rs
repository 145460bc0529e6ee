use crate::{Backend, BackendError, Program, ProgramSolution, Sense};
use osqp::{CscMatrix, Problem, Settings, Status};

/// A backend using the OSQP (Operator Splitting Quadratic Program) solver.
///
/// OSQP uses the Alternating Direction Method of Multipliers (ADMM) approach, which can
/// be faster than interior point methods for large programs, though sometimes with lower
/// precision. Solution polishing is enabled to recover accurate duals.
#[derive(Debug, Clone)]
pub struct OsqpBackend {
    /// Absolute tolerance
    pub eps_abs: f64,
    /// Relative tolerance
    pub eps_rel: f64,
    /// Iteration limit
    pub max_iter: u32,
}

impl Default for OsqpBackend {
    fn default() -> Self {
        Self {
            eps_abs: 1e-7,
            eps_rel: 1e-7,
            max_iter: 100_000,
        }
    }
}

impl Backend for OsqpBackend {
    fn solve(&self, program: &Program) -> Result<ProgramSolution, BackendError> {
        let n = program.ncols();
        let m = program.nrows();

        // OSQP handles constraints via a box specification, e.g. lb <= Ax <= ub,
        // where equality is handled via setting lb[i] = ub[i].
        let identity: Vec<usize> = (0..m).collect();
        let a = program.csc(&identity);
        let a_matrix = CscMatrix {
            nrows: m,
            ncols: n,
            indptr: a.colptr.into(),
            indices: a.rowval.into(),
            data: a.nzval.into(),
        };
        let (lb, ub): (Vec<f64>, Vec<f64>) = program
            .rows
            .iter()
            .map(|row| match row.sense {
                Sense::Equal => (row.rhs, row.rhs),
                Sense::AtMost => (f64::NEG_INFINITY, row.rhs),
            })
            .unzip();

        // OSQP expects the upper triangle of P, which for a diagonal is the diagonal
        let p = program.p_csc();
        let p_matrix = CscMatrix {
            nrows: n,
            ncols: n,
            indptr: p.colptr.into(),
            indices: p.rowval.into(),
            data: p.nzval.into(),
        };

        let settings = Settings::default()
            .verbose(false)
            .polishing(true)
            .eps_abs(self.eps_abs)
            .eps_rel(self.eps_rel)
            .max_iter(self.max_iter);

        let mut problem = Problem::new(&p_matrix, &program.q, &a_matrix, &lb, &ub, &settings)
            .map_err(|e| BackendError::Setup(format!("{e:?}")))?;

        match problem.solve() {
            Status::Solved(solution) => Ok(ProgramSolution {
                x: solution.x().to_vec(),
                duals: solution.y().to_vec(),
                objective: solution.obj_val(),
            }),
            Status::SolvedInaccurate(_) => Err(BackendError::NotSolved("solved inaccurate".into())),
            Status::MaxIterationsReached(_) => {
                Err(BackendError::NotSolved("max iterations reached".into()))
            }
            Status::PrimalInfeasible(_) | Status::PrimalInfeasibleInaccurate(_) => {
                Err(BackendError::NotSolved("primal infeasible".into()))
            }
            Status::DualInfeasible(_) | Status::DualInfeasibleInaccurate(_) => {
                Err(BackendError::NotSolved("dual infeasible".into()))
            }
            _ => Err(BackendError::NotSolved("unsolved".into())),
        }
    }
}
