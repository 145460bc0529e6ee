use crate::models::{BidId, Map, Product, TimepointId, TimeseriesId, ZoneId};

/// One (bid, zone, timepoint) row of the bid log.
#[derive(Debug, Clone, PartialEq)]
pub struct BidLogRow {
    /// The bid
    pub bid: BidId,
    /// The zone
    pub zone: ZoneId,
    /// The timeseries
    pub timeseries: TimeseriesId,
    /// The timepoint
    pub timepoint: TimepointId,
    /// The marginal cost per product at the time of the bid; absent before the first solve
    pub marginal_cost: Map<Product, Option<f64>>,
    /// The price per product offered to the demand model
    pub price: Map<Product>,
    /// The quantity per product chosen by the demand model
    pub quantity: Map<Product>,
    /// The benefit of the (bid, zone, timeseries), repeated on every row
    pub benefit: f64,
    /// The baseline price
    pub base_price: f64,
    /// The baseline load
    pub base_load: f64,
}

/// Durable storage for bids, so that an interrupted run can resume.
///
/// A log is keyed by the run tag. Only a run writing bid 1 starts a fresh log;
/// every later bid is appended.
pub trait BidLog {
    /// Error type for storage failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether a log exists for this run
    fn exists(&self) -> bool;

    /// Read every row of the log, in the order written
    fn read(&mut self) -> Result<Vec<BidLogRow>, Self::Error>;

    /// Discard any existing log and start a fresh one with columns for `products`
    fn start(&mut self, products: &[Product]) -> Result<(), Self::Error>;

    /// Append the rows of one bid
    fn append(&mut self, rows: &[BidLogRow]) -> Result<(), Self::Error>;
}
