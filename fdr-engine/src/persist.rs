use fdr_core::{
    models::{
        Baseline, Bid, BidId, BidLedger, LedgerError, Map, Offer, Product, Profile, Snapshot,
        Timeline, TimepointId, TimeseriesId, ZoneId,
    },
    ports::BidLogRow,
};
use thiserror::Error;

/// The offers of one bid, as recovered from the log
pub type ReplayedBid = (BidId, Map<(ZoneId, TimeseriesId), Offer>);

/// The log rows of one bid, one per (zone, timepoint).
///
/// `previous` is the solve whose marginal costs the bid responded to; the marginal
/// cost columns stay empty for bids created before the first solve.
pub fn bid_rows(
    bid: &Bid,
    timeline: &Timeline,
    products: &[Product],
    baseline: &Baseline,
    previous: Option<&Snapshot>,
) -> Vec<BidLogRow> {
    let mut rows = Vec::new();
    for (zone, series_id, offer) in bid.offers() {
        let Some(series) = timeline.series(series_id) else {
            continue;
        };
        for (i, timepoint) in series.timepoints.iter().enumerate() {
            let (base_price, base_load) = baseline
                .get(zone, timepoint)
                .map(|point| (point.price, point.load))
                .unwrap_or_default();
            rows.push(BidLogRow {
                bid: bid.id(),
                zone: zone.clone(),
                timeseries: series_id.clone(),
                timepoint: timepoint.clone(),
                marginal_cost: products
                    .iter()
                    .map(|&p| (p, previous.map(|s| s.marginal_cost(zone, timepoint, p))))
                    .collect(),
                price: products
                    .iter()
                    .map(|&p| (p, offer.prices.value(p, i)))
                    .collect(),
                quantity: products
                    .iter()
                    .map(|&p| (p, offer.quantities.value(p, i)))
                    .collect(),
                benefit: offer.benefit,
                base_price,
                base_load,
            });
        }
    }
    rows
}

// The values of one (bid, zone, timeseries) collected from its rows
struct Partial {
    prices: Map<Product, Vec<Option<f64>>>,
    quantities: Map<Product, Vec<Option<f64>>>,
    benefit: f64,
}

impl Partial {
    fn new(products: &[Product], len: usize, benefit: f64) -> Self {
        Self {
            prices: products.iter().map(|&p| (p, vec![None; len])).collect(),
            quantities: products.iter().map(|&p| (p, vec![None; len])).collect(),
            benefit,
        }
    }
}

/// Rebuild the bids of a log.
///
/// Rows may come in any order within a bid, but bids must be contiguous from 1 and
/// every (zone, timepoint) of every bid must appear exactly once. Product columns
/// the run does not trade are ignored.
pub fn replay(
    rows: &[BidLogRow],
    timeline: &Timeline,
    zones: &[ZoneId],
    products: &[Product],
) -> Result<Vec<ReplayedBid>, ReplayError> {
    let mut bids: Vec<(BidId, Map<(ZoneId, TimeseriesId), Partial>)> = Vec::new();

    for row in rows {
        let bid = row.bid;
        match bids.last() {
            Some((last, _)) if *last == bid => {}
            last => {
                let expected = last.map(|(id, _)| id.next()).unwrap_or(BidId::FIRST);
                if bid != expected {
                    return Err(ReplayError::NotContiguous { expected, got: bid });
                }
                bids.push((bid, Map::default()));
            }
        }

        if !zones.contains(&row.zone) {
            return Err(ReplayError::UnknownZone {
                bid,
                zone: row.zone.clone(),
            });
        }
        let (series, position) =
            timeline
                .locate(&row.timepoint)
                .ok_or_else(|| ReplayError::UnknownTimepoint {
                    bid,
                    timepoint: row.timepoint.clone(),
                })?;
        if series.id != row.timeseries {
            return Err(ReplayError::TimeseriesMismatch {
                bid,
                timepoint: row.timepoint.clone(),
                expected: series.id.clone(),
                got: row.timeseries.clone(),
            });
        }

        let partials = match bids.last_mut() {
            Some((_, partials)) => partials,
            None => continue,
        };
        let partial = partials
            .entry((row.zone.clone(), series.id.clone()))
            .or_insert_with(|| Partial::new(products, series.len(), row.benefit));
        if partial.benefit.to_bits() != row.benefit.to_bits() {
            return Err(ReplayError::InconsistentBenefit {
                bid,
                zone: row.zone.clone(),
                timeseries: series.id.clone(),
            });
        }

        for &product in products {
            let price = row
                .price
                .get(&product)
                .copied()
                .ok_or(ReplayError::MissingProduct { bid, product })?;
            let quantity = row
                .quantity
                .get(&product)
                .copied()
                .ok_or(ReplayError::MissingProduct { bid, product })?;
            let slots = (
                partial.prices.get_mut(&product),
                partial.quantities.get_mut(&product),
            );
            if let (Some(prices), Some(quantities)) = slots {
                if prices[position].is_some() {
                    return Err(ReplayError::DuplicateRow {
                        bid,
                        zone: row.zone.clone(),
                        timepoint: row.timepoint.clone(),
                    });
                }
                prices[position] = Some(price);
                quantities[position] = Some(quantity);
            }
        }
    }

    bids.into_iter()
        .map(|(bid, partials)| complete(bid, partials, timeline, zones))
        .collect()
}

// Check that a bid covers every (zone, timepoint) and assemble its offers
fn complete(
    bid: BidId,
    mut partials: Map<(ZoneId, TimeseriesId), Partial>,
    timeline: &Timeline,
    zones: &[ZoneId],
) -> Result<ReplayedBid, ReplayError> {
    let mut offers = Map::with_capacity(partials.len());
    for zone in zones {
        for series in timeline.timeseries() {
            let key = (zone.clone(), series.id.clone());
            let missing = |position: usize| ReplayError::MissingRow {
                bid,
                zone: zone.clone(),
                timepoint: series.timepoints[position].clone(),
            };
            let Some(partial) = partials.swap_remove(&key) else {
                return Err(missing(0));
            };
            let gather = |values: Map<Product, Vec<Option<f64>>>| {
                values
                    .into_iter()
                    .map(|(product, column)| {
                        column
                            .into_iter()
                            .enumerate()
                            .map(|(i, v)| v.ok_or_else(|| missing(i)))
                            .collect::<Result<Vec<f64>, _>>()
                            .map(|column| (product, column))
                    })
                    .collect::<Result<Profile, _>>()
            };
            offers.insert(
                key,
                Offer {
                    prices: gather(partial.prices)?,
                    quantities: gather(partial.quantities)?,
                    benefit: partial.benefit,
                },
            );
        }
    }
    Ok((bid, offers))
}

/// Append replayed bids to the ledger, in id order
pub fn restore(ledger: &mut BidLedger, bids: Vec<ReplayedBid>) -> Result<(), ReplayError> {
    for (bid, offers) in bids {
        ledger
            .restore(bid, offers)
            .map_err(|source| ReplayError::Rejected { bid, source })?;
    }
    Ok(())
}

/// The ways a bid log can fail to describe a valid sequence of bids.
#[derive(Debug, Error, PartialEq)]
pub enum ReplayError {
    /// Bid ids must run 1, 2, 3, ... without gaps or interleaving
    #[error("expected bid {expected}, found bid {got}")]
    NotContiguous {
        /// The id that should come next
        expected: BidId,
        /// The id found
        got: BidId,
    },

    /// A row names a zone the run does not have
    #[error("bid {bid} refers to unknown zone {zone}")]
    UnknownZone {
        /// The bid
        bid: BidId,
        /// The zone
        zone: ZoneId,
    },

    /// A row names a timepoint the run does not have
    #[error("bid {bid} refers to unknown timepoint {timepoint}")]
    UnknownTimepoint {
        /// The bid
        bid: BidId,
        /// The timepoint
        timepoint: TimepointId,
    },

    /// A row puts a timepoint in the wrong timeseries
    #[error("bid {bid} puts timepoint {timepoint} in timeseries {got}, not {expected}")]
    TimeseriesMismatch {
        /// The bid
        bid: BidId,
        /// The timepoint
        timepoint: TimepointId,
        /// The timeseries of the timepoint
        expected: TimeseriesId,
        /// The timeseries in the log
        got: TimeseriesId,
    },

    /// A (bid, zone, timepoint) appears twice
    #[error("bid {bid} has more than one row for zone {zone}, timepoint {timepoint}")]
    DuplicateRow {
        /// The bid
        bid: BidId,
        /// The zone
        zone: ZoneId,
        /// The timepoint
        timepoint: TimepointId,
    },

    /// A (bid, zone, timepoint) is absent
    #[error("bid {bid} has no row for zone {zone}, timepoint {timepoint}")]
    MissingRow {
        /// The bid
        bid: BidId,
        /// The zone
        zone: ZoneId,
        /// The timepoint
        timepoint: TimepointId,
    },

    /// A product traded by the run has no columns in the log
    #[error("bid {bid} has no values for {product}")]
    MissingProduct {
        /// The bid
        bid: BidId,
        /// The product
        product: Product,
    },

    /// The rows of one (bid, zone, timeseries) disagree on the benefit
    #[error("bid {bid} has more than one benefit for zone {zone}, timeseries {timeseries}")]
    InconsistentBenefit {
        /// The bid
        bid: BidId,
        /// The zone
        zone: ZoneId,
        /// The timeseries
        timeseries: TimeseriesId,
    },

    /// The ledger refused a replayed bid
    #[error("bid {bid} was rejected: {source}")]
    Rejected {
        /// The bid
        bid: BidId,
        /// The ledger's reason
        #[source]
        source: LedgerError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdr_core::models::{BaselinePoint, Period, Timeseries, WeightPolicy};
    use rstest::*;

    #[fixture]
    fn timeline() -> Timeline {
        Timeline::new(
            vec![Period {
                id: "2030".into(),
                annual_to_npv: 1.0,
            }],
            vec![
                Timeseries {
                    id: "a".into(),
                    period: "2030".into(),
                    duration_hours: 12.0,
                    scale_to_year: 300.0,
                    timepoints: vec!["a1".into(), "a2".into()],
                },
                Timeseries {
                    id: "b".into(),
                    period: "2030".into(),
                    duration_hours: 24.0,
                    scale_to_year: 65.0,
                    timepoints: vec!["b1".into()],
                },
            ],
        )
        .unwrap()
    }

    fn ledger(timeline: &Timeline, bids: usize) -> BidLedger {
        let zones = [ZoneId::from("z")];
        let products = [Product::Energy, Product::ReserveUp];
        let mut ledger = BidLedger::new(timeline, &zones, &products, WeightPolicy::default());
        for k in 0..bids {
            let offers = timeline
                .timeseries()
                .map(|ts| {
                    let offer = Offer {
                        prices: Profile::from_fn(&products, ts.len(), |p, i| {
                            if p.is_reserve() { 0.1 } else { 50.0 * (k + i + 1) as f64 }
                        }),
                        quantities: Profile::from_fn(&products, ts.len(), |p, i| {
                            if p.is_reserve() { -1.0 } else { 0.1 + (k * i) as f64 / 3.0 }
                        }),
                        benefit: k as f64 / 7.0,
                    };
                    ((zones[0].clone(), ts.id.clone()), offer)
                })
                .collect();
            ledger.append(offers).unwrap();
        }
        ledger
    }

    fn rows(timeline: &Timeline, ledger: &BidLedger) -> Vec<BidLogRow> {
        let baseline: Baseline = ["a1", "a2", "b1"]
            .into_iter()
            .map(|tp| {
                (
                    ("z".into(), tp.into()),
                    BaselinePoint {
                        load: 10.0,
                        price: 100.0,
                    },
                )
            })
            .collect();
        ledger
            .iter()
            .flat_map(|bid| bid_rows(bid, timeline, ledger.products(), &baseline, None))
            .collect()
    }

    #[rstest]
    fn replayed_bids_are_identical(timeline: Timeline) {
        let original = ledger(&timeline, 3);
        let rows = rows(&timeline, &original);
        assert_eq!(rows.len(), 9);
        assert!(rows[0].marginal_cost.values().all(Option::is_none));

        let zones = [ZoneId::from("z")];
        let replayed = replay(&rows, &timeline, &zones, original.products()).unwrap();
        let mut restored =
            BidLedger::new(&timeline, &zones, original.products(), WeightPolicy::default());
        restore(&mut restored, replayed).unwrap();

        assert_eq!(restored.len(), 3);
        for (a, b) in original.iter().zip(restored.iter()) {
            assert_eq!(a, b);
        }
    }

    #[rstest]
    fn rows_may_come_in_any_order_within_a_bid(timeline: Timeline) {
        let original = ledger(&timeline, 1);
        let mut rows = rows(&timeline, &original);
        rows.reverse();
        let zones = [ZoneId::from("z")];
        let replayed = replay(&rows, &timeline, &zones, original.products()).unwrap();
        assert_eq!(replayed.len(), 1);
    }

    #[rstest]
    fn gaps_in_ids_are_rejected(timeline: Timeline) {
        let original = ledger(&timeline, 2);
        let rows: Vec<_> = rows(&timeline, &original)
            .into_iter()
            .filter(|row| row.bid != BidId::FIRST)
            .collect();
        let zones = [ZoneId::from("z")];
        assert_eq!(
            replay(&rows, &timeline, &zones, original.products()),
            Err(ReplayError::NotContiguous {
                expected: BidId::FIRST,
                got: BidId::from(2)
            })
        );
    }

    #[rstest]
    fn incomplete_and_inconsistent_bids_are_rejected(timeline: Timeline) {
        let original = ledger(&timeline, 2);
        let zones = [ZoneId::from("z")];
        let products = original.products();

        let mut missing = rows(&timeline, &original);
        missing.remove(1);
        assert!(matches!(
            replay(&missing, &timeline, &zones, products),
            Err(ReplayError::MissingRow { timepoint, .. }) if timepoint.as_str() == "a2"
        ));

        let mut duplicated = rows(&timeline, &original);
        duplicated.insert(1, duplicated[0].clone());
        assert!(matches!(
            replay(&duplicated, &timeline, &zones, products),
            Err(ReplayError::DuplicateRow { .. })
        ));

        let mut inconsistent = rows(&timeline, &original);
        inconsistent[4].benefit += 1e-12;
        assert!(matches!(
            replay(&inconsistent, &timeline, &zones, products),
            Err(ReplayError::InconsistentBenefit { .. })
        ));

        let mut moved = rows(&timeline, &original);
        moved[0].timeseries = "b".into();
        assert!(matches!(
            replay(&moved, &timeline, &zones, products),
            Err(ReplayError::TimeseriesMismatch { .. })
        ));

        let narrow = rows(&timeline, &original);
        assert!(matches!(
            replay(&narrow, &timeline, &zones, &[Product::Energy, Product::ReserveDown]),
            Err(ReplayError::MissingProduct {
                product: Product::ReserveDown,
                ..
            })
        ));
        assert!(matches!(
            replay(&narrow, &timeline, &["elsewhere".into()], products),
            Err(ReplayError::UnknownZone { .. })
        ));
    }
}
