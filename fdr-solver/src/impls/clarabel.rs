use crate::{Backend, BackendError, Program, ProgramSolution};
use clarabel::{algebra::*, solver::*};

/// A backend using the Clarabel interior point solver.
#[derive(Clone)]
pub struct ClarabelBackend(DefaultSettings<f64>);

impl Default for ClarabelBackend {
    fn default() -> Self {
        let mut settings = DefaultSettings::default();
        settings.verbose = false;
        Self(settings)
    }
}

impl ClarabelBackend {
    /// Use the given solver settings
    pub fn new(settings: DefaultSettings<f64>) -> Self {
        Self(settings)
    }
}

impl std::fmt::Debug for ClarabelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClarabelBackend").finish_non_exhaustive()
    }
}

impl Backend for ClarabelBackend {
    fn solve(&self, program: &Program) -> Result<ProgramSolution, BackendError> {
        // Clarabel handles constraints via a cone specification, e.g. Ax + s = b, where s is
        // a cone. Our equalities go into the zero cone, which has to come first, and our
        // upper bounds go into the nonnegative cone.
        let (order, nequal) = program.equalities_first();
        let m = order.len();
        let n = program.ncols();

        let a = program.csc(&order);
        let a_matrix = CscMatrix::new(m, n, a.colptr, a.rowval, a.nzval);
        let b: Vec<f64> = order.iter().map(|&row| program.rows[row].rhs).collect();

        let mut cones = Vec::with_capacity(2);
        if nequal > 0 {
            cones.push(ZeroConeT(nequal));
        }
        if m > nequal {
            cones.push(NonnegativeConeT(m - nequal));
        }

        // Our quadratic term is diagonal
        let p = program.p_csc();
        let p_matrix = CscMatrix::new(n, n, p.colptr, p.rowval, p.nzval);

        let mut solver = DefaultSolver::new(
            &p_matrix,
            &program.q,
            &a_matrix,
            &b,
            &cones,
            self.0.clone(),
        )
        .map_err(|e| BackendError::Setup(format!("{e:?}")))?;
        solver.solve();

        let solution = solver.solution;
        if !matches!(
            solution.status,
            SolverStatus::Solved | SolverStatus::AlmostSolved
        ) {
            return Err(BackendError::NotSolved(format!("{:?}", solution.status)));
        }

        // Undo the row permutation so duals line up with the program's rows
        let mut duals = vec![0.0; m];
        for (position, &row) in order.iter().enumerate() {
            duals[row] = solution.z[position];
        }

        Ok(ProgramSolution {
            x: solution.x,
            duals,
            objective: solution.obj_val,
        })
    }
}
