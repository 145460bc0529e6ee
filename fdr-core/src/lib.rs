#![warn(missing_docs)]
//! Core models and ports for coordinating flexible demand with a dispatch model.
//!
//! The coordination loop alternates between a demand-side model, which answers
//! "what would you consume at these prices, and what is that worth to you?", and
//! a supply-side dispatch model, which picks the cheapest convex combination of
//! all the answers collected so far. Neither side sees the internals of the
//! other; they communicate exclusively through prices, quantities and benefits.

/// Core domain models for demand response coordination.
///
/// This module contains the fundamental data structures that represent the domain entities:
/// identifiers, the timeline of representative timepoints, bids and the ledger that owns them,
/// the baseline calibration, and the per-iteration snapshot of a solved dispatch.
///
/// The models in this module are primarily data structures with minimal business logic,
/// following the principles of the hexagonal architecture to separate domain entities
/// from their persistence and processing implementations.
pub mod models;

/// Interface traits for demand response coordination.
///
/// This module contains the "ports" in the hexagonal architecture pattern: the dispatch model,
/// the demand model, the bid log and the reporter. The iteration controller is written against
/// these traits only, so any of the collaborators can be swapped out without affecting the
/// coordination algorithm.
pub mod ports;
