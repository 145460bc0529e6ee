/// Whether a row is an equality or an upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// `terms == rhs`
    Equal,
    /// `terms <= rhs`
    AtMost,
}

/// A sparse linear constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Equality or upper bound
    pub sense: Sense,
    /// The right-hand side
    pub rhs: f64,
    /// (column, coefficient) pairs; repeated columns are summed
    pub terms: Vec<(usize, f64)>,
}

impl Row {
    pub(crate) fn at_most(terms: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self {
            sense: Sense::AtMost,
            rhs,
            terms,
        }
    }

    pub(crate) fn equal(terms: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self {
            sense: Sense::Equal,
            rhs,
            terms,
        }
    }
}

/// A convex QP with a diagonal quadratic term:
/// minimize `½ Σ p_j x_j² + Σ q_j x_j` subject to the rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    /// The diagonal of the quadratic term
    pub p_diag: Vec<f64>,
    /// The linear term
    pub q: Vec<f64>,
    /// The constraints
    pub rows: Vec<Row>,
}

/// The primal and dual solution of a [`Program`].
///
/// Duals follow the convention `P x + q + Aᵀ y = 0`, so the dual of a row is the
/// marginal increase in cost when its right-hand side decreases.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSolution {
    /// The primal values, one per column
    pub x: Vec<f64>,
    /// The dual values, one per row, in the program's row order
    pub duals: Vec<f64>,
    /// The objective value
    pub objective: f64,
}

/// The memory representation of a compressed sparse column matrix.
pub(crate) struct Csc {
    pub colptr: Vec<usize>,
    pub rowval: Vec<usize>,
    pub nzval: Vec<f64>,
}

impl Program {
    /// The number of columns
    pub fn ncols(&self) -> usize {
        self.q.len()
    }

    /// The number of rows
    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    /// A row permutation that puts the equality rows first, preserving relative order.
    /// Returns the permutation (position -> original row) and the number of equalities.
    pub(crate) fn equalities_first(&self) -> (Vec<usize>, usize) {
        let (mut order, rest): (Vec<usize>, Vec<usize>) =
            (0..self.rows.len()).partition(|&i| self.rows[i].sense == Sense::Equal);
        let nequal = order.len();
        order.extend(rest);
        (order, nequal)
    }

    /// The constraint matrix with rows permuted by `order`, in CSC form.
    ///
    /// Our rows are stored by row, so we transpose on the way; row indices end up
    /// sorted within each column, and repeated entries are summed.
    pub(crate) fn csc(&self, order: &[usize]) -> Csc {
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); self.ncols()];
        for (position, &original) in order.iter().enumerate() {
            for &(col, value) in self.rows[original].terms.iter() {
                columns[col].push((position, value));
            }
        }

        let mut colptr = Vec::with_capacity(self.ncols() + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();
        for mut column in columns {
            colptr.push(nzval.len());
            column.sort_by_key(|&(row, _)| row);
            for (row, value) in column {
                if rowval.len() > *colptr.last().unwrap_or(&0) && rowval.last() == Some(&row) {
                    if let Some(last) = nzval.last_mut() {
                        *last += value;
                    }
                } else {
                    rowval.push(row);
                    nzval.push(value);
                }
            }
        }
        colptr.push(nzval.len());

        Csc {
            colptr,
            rowval,
            nzval,
        }
    }

    /// The diagonal quadratic term in CSC form, holding only its non-zero entries
    pub(crate) fn p_csc(&self) -> Csc {
        let mut colptr = Vec::with_capacity(self.ncols() + 1);
        let mut rowval = Vec::new();
        let mut nzval = Vec::new();
        for (col, &value) in self.p_diag.iter().enumerate() {
            colptr.push(nzval.len());
            if value != 0.0 {
                rowval.push(col);
                nzval.push(value);
            }
        }
        colptr.push(nzval.len());
        Csc {
            colptr,
            rowval,
            nzval,
        }
    }

    /// The magnitude of the largest cost coefficient, or 1 for a program without costs.
    ///
    /// Present-value costs run to 1e8 and more, which interior point solvers do not
    /// cope with; dividing the objective by this factor brings it to order one.
    pub fn cost_scale(&self) -> f64 {
        let largest = self
            .q
            .iter()
            .chain(self.p_diag.iter())
            .fold(0.0_f64, |largest, value| largest.max(value.abs()));
        if largest.is_normal() { largest } else { 1.0 }
    }

    /// The same program with its objective divided by `scale`
    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            p_diag: self.p_diag.iter().map(|p| p / scale).collect(),
            q: self.q.iter().map(|q| q / scale).collect(),
            rows: self.rows.clone(),
        }
    }
}

impl ProgramSolution {
    /// Undo [`Program::scaled`]: the primal is unchanged, duals and the objective
    /// are multiplied back by `scale`
    pub fn unscaled(mut self, scale: f64) -> Self {
        for dual in self.duals.iter_mut() {
            *dual *= scale;
        }
        self.objective *= scale;
        self
    }
}
