use crate::models::{Bid, BidId, Map, Offer, PeriodId, Product, Timeline, Timeseries, TimeseriesId, ZoneId};
use thiserror::Error;

/// The time block over which a single bid weight applies.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum WeightBlock {
    /// One weight per timeseries (dynamic pricing)
    Timeseries(TimeseriesId),
    /// One weight for every timeseries of a period (flat pricing)
    Period(PeriodId),
}

/// The set of (zone, timeseries) pairs that share one weight per bid.
///
/// `zone` is `None` when weights are shared system-wide.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct WeightScope {
    /// The zone, or `None` for a system-wide weight
    pub zone: Option<ZoneId>,
    /// The time block
    pub block: WeightBlock,
}

impl std::fmt::Display for WeightScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.zone {
            Some(zone) => write!(f, "{zone},")?,
            None => f.write_str("system,")?,
        }
        match &self.block {
            WeightBlock::Timeseries(id) => write!(f, "{id}"),
            WeightBlock::Period(id) => write!(f, "{id}"),
        }
    }
}

/// How bid weights are shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightPolicy {
    /// Give each zone its own weights instead of one system-wide weight
    pub zonal: bool,
    /// Share weights across all timeseries of a period (flat pricing)
    pub per_period: bool,
}

impl WeightPolicy {
    /// The scope that the weight for (zone, series) belongs to
    pub fn scope(&self, zone: &ZoneId, series: &Timeseries) -> WeightScope {
        WeightScope {
            zone: self.zonal.then(|| zone.clone()),
            block: if self.per_period {
                WeightBlock::Period(series.period.clone())
            } else {
                WeightBlock::Timeseries(series.id.clone())
            },
        }
    }
}

/// The append-only collection of every bid of a run.
///
/// The ledger assigns ids in strictly increasing order starting at 1, validates that
/// every bid covers exactly the configured zones, timeseries and products, and
/// describes the convex-weight structure the dispatch model must honor: one weight
/// variable per (bid, scope), and weights within a scope summing to one.
#[derive(Debug, Clone)]
pub struct BidLedger {
    policy: WeightPolicy,
    products: Vec<Product>,
    // (zone, timeseries) -> (number of timepoints, weight scope)
    coverage: Map<(ZoneId, TimeseriesId), (usize, WeightScope)>,
    bids: Vec<Bid>,
}

impl BidLedger {
    /// Create an empty ledger for the given zones, timeline and products
    pub fn new(
        timeline: &Timeline,
        zones: &[ZoneId],
        products: &[Product],
        policy: WeightPolicy,
    ) -> Self {
        let coverage = zones
            .iter()
            .flat_map(|zone| {
                timeline.timeseries().map(move |series| {
                    (
                        (zone.clone(), series.id.clone()),
                        (series.len(), policy.scope(zone, series)),
                    )
                })
            })
            .collect();

        Self {
            policy,
            products: products.to_vec(),
            coverage,
            bids: Vec::new(),
        }
    }

    /// The weight sharing policy
    pub fn policy(&self) -> WeightPolicy {
        self.policy
    }

    /// The products every bid covers
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// The id the next appended bid will receive
    pub fn next_id(&self) -> BidId {
        self.bids
            .last()
            .map(|bid| bid.id().next())
            .unwrap_or(BidId::FIRST)
    }

    /// Validate the offers and append them as a new bid with the next id
    pub fn append(&mut self, offers: Map<(ZoneId, TimeseriesId), Offer>) -> Result<&Bid, LedgerError> {
        let id = self.next_id();
        self.push(id, offers)
    }

    /// Append a previously persisted bid, which must carry exactly the next id
    pub fn restore(
        &mut self,
        id: BidId,
        offers: Map<(ZoneId, TimeseriesId), Offer>,
    ) -> Result<&Bid, LedgerError> {
        let expected = self.next_id();
        if id != expected {
            return Err(LedgerError::OutOfOrder { expected, got: id });
        }
        self.push(id, offers)
    }

    fn push(
        &mut self,
        id: BidId,
        mut offers: Map<(ZoneId, TimeseriesId), Offer>,
    ) -> Result<&Bid, LedgerError> {
        let mut validated = Map::with_capacity(self.coverage.len());
        for ((zone, series), (len, _)) in self.coverage.iter() {
            let key = (zone.clone(), series.clone());
            let Some(offer) = offers.swap_remove(&key) else {
                return Err(LedgerError::MissingOffer {
                    zone: zone.clone(),
                    timeseries: series.clone(),
                });
            };
            let shape_error = || LedgerError::ProfileShape {
                zone: zone.clone(),
                timeseries: series.clone(),
            };
            let prices = offer
                .prices
                .conform(&self.products, *len)
                .ok_or_else(shape_error)?;
            let quantities = offer
                .quantities
                .conform(&self.products, *len)
                .ok_or_else(shape_error)?;
            let finite = quantities
                .iter()
                .chain(prices.iter())
                .all(|(_, values)| values.iter().all(|v| v.is_finite()));
            if !finite || !offer.benefit.is_finite() {
                return Err(LedgerError::NonFinite {
                    zone: zone.clone(),
                    timeseries: series.clone(),
                });
            }
            validated.insert(
                key,
                Offer {
                    prices,
                    quantities,
                    benefit: offer.benefit,
                },
            );
        }

        if let Some(((zone, series), _)) = offers.into_iter().next() {
            return Err(LedgerError::UnexpectedOffer {
                zone,
                timeseries: series,
            });
        }

        self.bids.push(Bid::new(id, validated));
        Ok(&self.bids[self.bids.len() - 1])
    }

    /// Look up a bid
    pub fn get(&self, id: BidId) -> Option<&Bid> {
        // ids are contiguous from 1
        let index = usize::try_from(id.get().checked_sub(1)?).ok()?;
        self.bids.get(index)
    }

    /// The most recently appended bid
    pub fn last(&self) -> Option<&Bid> {
        self.bids.last()
    }

    /// The number of bids
    pub fn len(&self) -> usize {
        self.bids.len()
    }

    /// Whether no bid has been appended yet
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    /// Every bid, in id order
    pub fn iter(&self) -> impl Iterator<Item = &Bid> {
        self.bids.iter()
    }

    /// The weight scope of a (zone, timeseries)
    pub fn scope(&self, zone: &ZoneId, timeseries: &TimeseriesId) -> Option<&WeightScope> {
        self.coverage
            .get(&(zone.clone(), timeseries.clone()))
            .map(|(_, scope)| scope)
    }

    /// Group the covered (zone, timeseries) pairs by weight scope
    pub fn weight_structure(&self) -> Map<WeightScope, Vec<(ZoneId, TimeseriesId)>> {
        let mut structure: Map<WeightScope, Vec<(ZoneId, TimeseriesId)>> = Map::default();
        for ((zone, series), (_, scope)) in self.coverage.iter() {
            structure
                .entry(scope.clone())
                .or_default()
                .push((zone.clone(), series.clone()));
        }
        structure
    }
}

/// The ways a bid can be rejected by the ledger.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    /// The bid has no offer for a covered (zone, timeseries)
    #[error("bid is missing an offer for zone {zone}, timeseries {timeseries}")]
    MissingOffer {
        /// The zone
        zone: ZoneId,
        /// The timeseries
        timeseries: TimeseriesId,
    },
    /// The bid has an offer for a (zone, timeseries) the run does not cover
    #[error("bid has an offer for unknown zone {zone}, timeseries {timeseries}")]
    UnexpectedOffer {
        /// The zone
        zone: ZoneId,
        /// The timeseries
        timeseries: TimeseriesId,
    },
    /// A profile has the wrong number of timepoints
    #[error("profile for zone {zone}, timeseries {timeseries} has the wrong length")]
    ProfileShape {
        /// The zone
        zone: ZoneId,
        /// The timeseries
        timeseries: TimeseriesId,
    },
    /// A price, quantity or benefit is NaN or infinite
    #[error("offer for zone {zone}, timeseries {timeseries} contains a non-finite value")]
    NonFinite {
        /// The zone
        zone: ZoneId,
        /// The timeseries
        timeseries: TimeseriesId,
    },
    /// A restored bid does not carry the next id
    #[error("expected bid {expected}, got bid {got}")]
    OutOfOrder {
        /// The id the ledger expected
        expected: BidId,
        /// The id that was offered
        got: BidId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Period, Profile};
    use rstest::*;

    #[fixture]
    fn timeline() -> Timeline {
        Timeline::new(
            vec![Period {
                id: "2030".into(),
                annual_to_npv: 1.0,
            }],
            ["d1", "d2"]
                .into_iter()
                .map(|id| Timeseries {
                    id: id.into(),
                    period: "2030".into(),
                    duration_hours: 12.0,
                    scale_to_year: 182.5,
                    timepoints: vec![format!("{id}a").into(), format!("{id}b").into()],
                })
                .collect(),
        )
        .unwrap()
    }

    fn offers(timeline: &Timeline, zones: &[ZoneId], q: f64) -> Map<(ZoneId, TimeseriesId), Offer> {
        zones
            .iter()
            .flat_map(|zone| {
                timeline.timeseries().map(move |ts| {
                    (
                        (zone.clone(), ts.id.clone()),
                        Offer {
                            prices: Profile::from_fn(&[Product::Energy], 2, |_, _| 50.0),
                            quantities: Profile::from_fn(&[Product::Energy], 2, |_, _| q),
                            benefit: 10.0 * q,
                        },
                    )
                })
            })
            .collect()
    }

    #[rstest]
    fn ids_grow_from_one(timeline: Timeline) {
        let zones: Vec<ZoneId> = vec!["north".into(), "south".into()];
        let mut ledger = BidLedger::new(&timeline, &zones, &[Product::Energy], Default::default());
        assert!(ledger.is_empty());
        for expected in 1..=4u64 {
            let bid = ledger.append(offers(&timeline, &zones, expected as f64)).unwrap();
            assert_eq!(bid.id(), BidId::from(expected));
        }
        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.get(BidId::from(3)).unwrap().benefit(&zones[0], &"d1".into()), 30.0);
        assert!(ledger.get(BidId::from(0)).is_none());
        assert_eq!(ledger.next_id(), BidId::from(5));
    }

    #[rstest]
    fn rejects_partial_coverage(timeline: Timeline) {
        let zones: Vec<ZoneId> = vec!["north".into(), "south".into()];
        let mut ledger = BidLedger::new(&timeline, &zones, &[Product::Energy], Default::default());
        let mut partial = offers(&timeline, &zones, 1.0);
        partial.swap_remove(&(zones[1].clone(), "d2".into()));
        assert!(matches!(ledger.append(partial), Err(LedgerError::MissingOffer { .. })));
        assert!(ledger.is_empty());
    }

    #[rstest]
    fn restore_requires_next_id(timeline: Timeline) {
        let zones: Vec<ZoneId> = vec!["north".into()];
        let mut ledger = BidLedger::new(&timeline, &zones, &[Product::Energy], Default::default());
        let err = ledger.restore(BidId::from(2), offers(&timeline, &zones, 1.0));
        assert_eq!(
            err.unwrap_err(),
            LedgerError::OutOfOrder {
                expected: BidId::FIRST,
                got: BidId::from(2)
            }
        );
        assert!(ledger.restore(BidId::FIRST, offers(&timeline, &zones, 1.0)).is_ok());
    }

    #[rstest]
    #[case(WeightPolicy { zonal: false, per_period: false }, 2)]
    #[case(WeightPolicy { zonal: true, per_period: false }, 4)]
    #[case(WeightPolicy { zonal: false, per_period: true }, 1)]
    #[case(WeightPolicy { zonal: true, per_period: true }, 2)]
    fn weight_structure_follows_policy(
        timeline: Timeline,
        #[case] policy: WeightPolicy,
        #[case] scopes: usize,
    ) {
        let zones: Vec<ZoneId> = vec!["north".into(), "south".into()];
        let ledger = BidLedger::new(&timeline, &zones, &[Product::Energy], policy);
        let structure = ledger.weight_structure();
        assert_eq!(structure.len(), scopes);
        let members: usize = structure.values().map(Vec::len).sum();
        assert_eq!(members, 4);
    }
}
