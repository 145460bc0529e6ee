use crate::{EngineError, oracle::Prices};
use fdr_core::{
    models::{
        Baseline, Bid, BidId, DEMAND_WELFARE, EnergyBalanceRow, IterationSummary, Map, Product,
        ProductBalance, Snapshot, Timeline, ZoneId,
    },
    ports::DispatchModel,
};

/// Summarize the latest solve.
///
/// Direct costs sum every registered cost component other than the welfare cost of
/// the flexible demand; payments and sales are annual, at the final marginal costs.
pub fn summary<M: DispatchModel>(
    model: &M,
    tag: &str,
    bid: BidId,
    snapshot: &Snapshot,
    timeline: &Timeline,
    zones: &[ZoneId],
    products: &[Product],
) -> Result<IterationSummary, EngineError> {
    let periods = timeline.periods().count();
    let components = model.cost_components();

    let mut direct_cost_per_year = Map::with_capacity(periods);
    let mut welfare_cost_per_year = Map::with_capacity(periods);
    for period in timeline.periods() {
        let mut direct = 0.0;
        for name in components.iter().filter(|name| *name != DEMAND_WELFARE) {
            direct += model
                .cost_component(name, &period.id)
                .map_err(EngineError::dispatch)?;
        }
        direct_cost_per_year.insert(period.id.clone(), direct);

        let welfare = timeline
            .series_in(&period.id)
            .flat_map(|series| {
                series.timepoints.iter().map(move |timepoint| {
                    snapshot.welfare_cost.value_or_zero(timepoint) * series.weight_in_year()
                })
            })
            .sum::<f64>();
        welfare_cost_per_year.insert(period.id.clone(), welfare);
    }

    let mut payment_per_year = Map::with_capacity(products.len() * periods);
    let mut sold_per_year = Map::with_capacity(products.len() * periods);
    for &product in products {
        for period in timeline.periods() {
            let key = (product, period.id.clone());
            payment_per_year.insert(key.clone(), 0.0);
            sold_per_year.insert(key.clone(), 0.0);
            for series in timeline.series_in(&period.id) {
                let weight = series.weight_in_year();
                for zone in zones {
                    for timepoint in series.timepoints.iter() {
                        let demand = snapshot.demand(zone, timepoint, product);
                        let mc = snapshot.marginal_cost(zone, timepoint, product);
                        payment_per_year.accumulate(key.clone(), demand * mc * weight);
                        sold_per_year.accumulate(key.clone(), demand * weight);
                    }
                }
            }
        }
    }

    Ok(IterationSummary {
        tag: tag.to_owned(),
        bid,
        total_cost: snapshot.system_cost,
        direct_cost_per_year,
        welfare_cost_per_year,
        payment_per_year,
        sold_per_year,
    })
}

/// The final energy balance, one row per (zone, timepoint).
///
/// A timeseries counts as a peak day when it occurs less than half as often as the
/// average timeseries.
pub fn energy_balance(
    last_bid: Option<&Bid>,
    snapshot: &Snapshot,
    final_prices: &Prices,
    timeline: &Timeline,
    zones: &[ZoneId],
    products: &[Product],
    baseline: &Baseline,
) -> Vec<EnergyBalanceRow> {
    let (total_scale, count) = timeline
        .timeseries()
        .fold((0.0, 0usize), |(sum, n), ts| (sum + ts.scale_to_year, n + 1));
    let average_scale = total_scale / count.max(1) as f64;

    let mut rows = Vec::with_capacity(zones.len() * timeline.timepoint_count());
    for zone in zones {
        for series in timeline.timeseries() {
            let offer = last_bid.and_then(|bid| bid.offer(zone, &series.id));
            let prices = final_prices.get(&(zone.clone(), series.id.clone()));
            let peak_day = series.scale_to_year < 0.5 * average_scale;
            for (i, timepoint) in series.timepoints.iter().enumerate() {
                let balances = products
                    .iter()
                    .map(|&product| {
                        let balance = ProductBalance {
                            offered_price: offer
                                .map(|o| o.prices.value(product, i))
                                .unwrap_or_default(),
                            bid_quantity: offer
                                .map(|o| o.quantities.value(product, i))
                                .unwrap_or_default(),
                            final_marginal_cost: snapshot.marginal_cost(zone, timepoint, product),
                            final_price: prices
                                .map(|p| p.value(product, i))
                                .unwrap_or_default(),
                            final_quantity: snapshot.demand(zone, timepoint, product),
                        };
                        (product, balance)
                    })
                    .collect();
                let (base_load, base_price) = baseline
                    .get(zone, timepoint)
                    .map(|point| (point.load, point.price))
                    .unwrap_or_default();
                rows.push(EnergyBalanceRow {
                    zone: zone.clone(),
                    period: series.period.clone(),
                    timepoint: timepoint.clone(),
                    peak_day,
                    products: balances,
                    base_load,
                    base_price,
                });
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdr_core::models::{BaselinePoint, Period, Profile, Timeseries};

    #[test]
    fn rare_timeseries_are_peak_days() {
        let timeline = Timeline::new(
            vec![Period {
                id: "2030".into(),
                annual_to_npv: 1.0,
            }],
            vec![
                Timeseries {
                    id: "typical".into(),
                    period: "2030".into(),
                    duration_hours: 24.0,
                    scale_to_year: 364.0,
                    timepoints: vec!["t".into()],
                },
                Timeseries {
                    id: "peak".into(),
                    period: "2030".into(),
                    duration_hours: 24.0,
                    scale_to_year: 1.0,
                    timepoints: vec!["p".into()],
                },
            ],
        )
        .unwrap();
        let zones = [ZoneId::from("z")];
        let products = [Product::Energy];
        let baseline: Baseline = [
            (("z".into(), "t".into()), BaselinePoint { load: 5.0, price: 50.0 }),
            (("z".into(), "p".into()), BaselinePoint { load: 9.0, price: 90.0 }),
        ]
        .into_iter()
        .collect();
        let snapshot = Snapshot {
            marginal_cost: [(("z".into(), "p".into(), Product::Energy), 400.0)]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let prices: Prices = [(
            ("z".into(), "peak".into()),
            [(Product::Energy, vec![410.0])].into_iter().collect::<Profile>(),
        )]
        .into_iter()
        .collect();

        let rows = energy_balance(None, &snapshot, &prices, &timeline, &zones, &products, &baseline);
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].peak_day);
        assert!(rows[1].peak_day);
        assert_eq!(rows[1].base_price, 90.0);
        let energy = rows[1].products[&Product::Energy];
        assert_eq!(energy.final_marginal_cost, 400.0);
        assert_eq!(energy.final_price, 410.0);
        assert_eq!(energy.offered_price, 0.0);
    }
}
