#![warn(missing_docs)]
//! CSV implementations of the persistence and reporting ports.
//!
//! [`CsvBidLog`] keeps one row per (bid, zone, timepoint) so that an interrupted
//! coordination run can be resumed with exactly the same bids. [`CsvReporter`]
//! writes the per-iteration summary, the final summary and the energy balance table.
//! Every file lives in [`CsvConfig::outputs_dir`] and carries the run tag in its name.

/// Configuration of the output files
pub mod config;
pub use config::CsvConfig;

mod bid_log;
pub use bid_log::{CsvBidLog, CsvLogError};

mod reporter;
pub use reporter::CsvReporter;

// Floats are written with `Display`, which is the shortest representation that
// parses back to the same value.
pub(crate) fn number(value: f64) -> String {
    value.to_string()
}
