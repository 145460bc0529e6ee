use crate::persist::ReplayError;
use fdr_core::models::{BaselineError, BidId, LedgerError, PeriodId, TimeseriesId, ZoneId};
use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The ways a coordination run can fail.
///
/// Configuration problems (a missing demand model, a malformed bid log, gaps in
/// the baseline) surface before the first solve. Numerical problems (weights far
/// outside [0, 1], missing duals, no flat price) abort the run where they occur.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No demand model was named in the configuration
    #[error("no demand module was configured")]
    NoDemandModule,

    /// The configured demand model is not in the catalog
    #[error("demand module `{name}` is not loaded (available: {available})")]
    DemandModuleNotLoaded {
        /// The requested name
        name: String,
        /// The names in the catalog, comma-separated
        available: String,
    },

    /// An invalid setting
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The bid log cannot be replayed
    #[error("malformed bid log: {0}")]
    MalformedBidLog(#[from] ReplayError),

    /// The baseline does not cover the run
    #[error("invalid baseline: {0}")]
    Baseline(#[from] BaselineError),

    /// A bid weight is outside [0, 1] by more than the configured slack
    #[error("bid {bid} has invalid weight {weight} for zone {zone}, timeseries {timeseries}")]
    WeightOutOfRange {
        /// The bid
        bid: BidId,
        /// The zone
        zone: ZoneId,
        /// The timeseries
        timeseries: TimeseriesId,
        /// The offending weight
        weight: f64,
    },

    /// The dispatch model solved without usable duals
    #[error("no dual values are available from the dispatch model")]
    MissingDuals,

    /// No revenue-neutral flat price could be found
    #[error("no flat price for zone {zone} in period {period}: {reason}")]
    RootFinding {
        /// The zone
        zone: ZoneId,
        /// The period
        period: PeriodId,
        /// Why the root finder gave up
        reason: String,
    },

    /// The ledger rejected a bid
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The dispatch model failed
    #[error("dispatch model: {0}")]
    Dispatch(#[source] BoxedError),

    /// The demand model failed
    #[error("demand model: {0}")]
    Demand(#[source] BoxedError),

    /// The bid log could not be read or written
    #[error("bid log: {0}")]
    BidLog(#[source] BoxedError),

    /// A report could not be written
    #[error("report: {0}")]
    Report(#[source] BoxedError),
}

impl EngineError {
    pub(crate) fn dispatch<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Dispatch(Box::new(error))
    }

    pub(crate) fn demand<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Demand(Box::new(error))
    }

    pub(crate) fn bid_log<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::BidLog(Box::new(error))
    }

    pub(crate) fn report<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Report(Box::new(error))
    }
}
