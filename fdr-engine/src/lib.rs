#![warn(missing_docs)]
//! The demand response bid coordination loop.
//!
//! A flexible-demand model and a dispatch model reach a joint equilibrium without
//! either seeing the other's internals. Every iteration the [`Controller`] reads
//! marginal prices from the last dispatch solve, asks the demand model what it
//! would consume at those prices, adds the answer as a new bid, and lets the
//! dispatch model choose the cheapest convex combination of all bids so far. The
//! loop stops once a lower bound on the achievable cost, derived from convexity of
//! the cost and benefit curves, is within a tolerance of the current solution.
//!
//! The dispatch model, the demand model, the bid log and the reporter are all
//! injected through the ports of [`fdr_core::ports`].

mod controller;
pub use controller::{Controller, Phase, RunOutcome};

/// The duality-gap bound used as the stopping criterion
pub mod convergence;

/// Demand models and the catalog they are loaded from
pub mod demand;

mod error;
pub use error::EngineError;

/// Marginal and flat prices
pub mod oracle;

/// Conversion between bids and bid log rows
pub mod persist;

/// Assembly of the summary and energy balance reports
pub mod report;

/// Deterministic seed bids
pub mod seeder;

mod settings;
pub use settings::{DemandParams, PricingMode, Settings};
