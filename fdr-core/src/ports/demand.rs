use crate::models::{CalibrationSeries, Profile, Timeseries, ZoneId};

/// A demand model's answer to a set of prices.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandResponse {
    /// The chosen quantities; products the model does not trade are absent or zero
    pub quantities: Profile,
    /// The willingness-to-pay for the quantities, as average $/h over the timeseries
    pub benefit: f64,
}

/// Interface to the demand side.
///
/// The demand model is an external collaborator: it is calibrated once against the
/// baseline, and then repeatedly asked what it would consume at a given price path.
/// Answers must be deterministic, since persisted bids are replayed on resume.
pub trait DemandModel {
    /// Error type for demand model failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// One-time setup with the baseline load and price of every (zone, timeseries)
    fn calibrate(&mut self, baseline: &[CalibrationSeries]) -> Result<(), Self::Error>;

    /// The quantities and benefit chosen for one zone and timeseries at the given prices
    fn bid(
        &mut self,
        zone: &ZoneId,
        timeseries: &Timeseries,
        prices: &Profile,
    ) -> Result<DemandResponse, Self::Error>;
}

impl<T: DemandModel + ?Sized> DemandModel for Box<T> {
    type Error = T::Error;

    fn calibrate(&mut self, baseline: &[CalibrationSeries]) -> Result<(), Self::Error> {
        (**self).calibrate(baseline)
    }

    fn bid(
        &mut self,
        zone: &ZoneId,
        timeseries: &Timeseries,
        prices: &Profile,
    ) -> Result<DemandResponse, Self::Error> {
        (**self).bid(zone, timeseries, prices)
    }
}
