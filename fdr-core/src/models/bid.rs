use crate::models::{BidId, Map, Product, Profile, TimeseriesId, ZoneId};

/// The demand model's answer for one (zone, timeseries) at one set of prices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Offer {
    /// The prices the demand model was shown
    pub prices: Profile,
    /// The quantities it chose; positive is consumption, negative is net supply
    pub quantities: Profile,
    /// The willingness-to-pay for the quantity path, as average $/h over the timeseries
    pub benefit: f64,
}

/// A candidate demand profile covering every zone and timeseries.
///
/// Bids are immutable once created. They are owned by the [`BidLedger`](crate::models::BidLedger),
/// which assigns their ids; the dispatch model receives them by reference and derives
/// whatever coefficients it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Bid {
    id: BidId,
    offers: Map<(ZoneId, TimeseriesId), Offer>,
}

impl Bid {
    pub(crate) fn new(id: BidId, offers: Map<(ZoneId, TimeseriesId), Offer>) -> Self {
        Self { id, offers }
    }

    /// The bid's identifier
    pub fn id(&self) -> BidId {
        self.id
    }

    /// The offer for a zone and timeseries
    pub fn offer(&self, zone: &ZoneId, timeseries: &TimeseriesId) -> Option<&Offer> {
        self.offers.get(&(zone.clone(), timeseries.clone()))
    }

    /// Every offer, in the order they were created
    pub fn offers(&self) -> impl Iterator<Item = (&ZoneId, &TimeseriesId, &Offer)> {
        self.offers.iter().map(|((z, ts), offer)| (z, ts, offer))
    }

    /// The quantity of one product at one timepoint position, zero if absent
    pub fn quantity(
        &self,
        zone: &ZoneId,
        timeseries: &TimeseriesId,
        product: Product,
        position: usize,
    ) -> f64 {
        self.offer(zone, timeseries)
            .map(|offer| offer.quantities.value(product, position))
            .unwrap_or(0.0)
    }

    /// The benefit for a zone and timeseries, zero if absent
    pub fn benefit(&self, zone: &ZoneId, timeseries: &TimeseriesId) -> f64 {
        self.offer(zone, timeseries)
            .map(|offer| offer.benefit)
            .unwrap_or(0.0)
    }
}
