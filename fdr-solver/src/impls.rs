use crate::{Program, ProgramSolution};
use thiserror::Error;

/// Implementation using the Clarabel interior point solver
#[cfg(feature = "clarabel")]
pub mod clarabel;

/// Implementation using the OSQP operator splitting solver
#[cfg(feature = "osqp")]
pub mod osqp;

/// A black-box solver for the dispatch program.
///
/// Backends are cloned onto the blocking thread pool for every solve, so they should be
/// cheap to clone (typically just their settings).
pub trait Backend: Clone + Send + Sync + 'static {
    /// Solve the program, returning primal values, duals and the objective value
    fn solve(&self, program: &Program) -> Result<ProgramSolution, BackendError>;
}

/// The ways a backend can fail to produce a solution.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The solver rejected the problem data or its settings
    #[error("unable to set up the solver: {0}")]
    Setup(String),
    /// The solver finished without an optimal solution
    #[error("solver finished with status {0}")]
    NotSolved(String),
}
