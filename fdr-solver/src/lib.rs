#![warn(missing_docs)]
//! A reference dispatch model for demand response bid coordination.
//!
//! [`MasterProblem`] is a small convex economic dispatch (zones, generators with linear and
//! quadratic costs, transport-model lines, unserved energy and optional system-wide reserve
//! requirements) that implements [`fdr_core::ports::DispatchModel`]. Every registered bid
//! becomes one weight column per weight scope, and the program chooses the cheapest convex
//! combination of bids alongside its own supply decisions. The numerical work is delegated
//! to a black-box QP solver through the [`Backend`] trait.

/**
 * These are implementations of the QP backend.
 */
mod impls;
pub use impls::*;

mod graph;
pub use graph::{Component, DependencyGraph};

mod master;
pub use master::{GENERATOR_HEADROOM, GENERATION, MasterProblem, ModelError, UNSERVED_ENERGY};

mod program;
pub use program::{Program, ProgramSolution, Row, Sense};

mod system;
pub use system::*;

/// JSON scenario input, combining a timeline, a system and a baseline
#[cfg(feature = "io")]
pub mod io;
