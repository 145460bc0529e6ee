mod bid_log;
mod demand;
mod dispatch;
mod reporter;

pub use bid_log::{BidLog, BidLogRow};
pub use demand::{DemandModel, DemandResponse};
pub use dispatch::DispatchModel;
pub use reporter::Reporter;
