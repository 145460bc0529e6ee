use fdr_core::{
    models::{BidLedger, Map, Offer, Product, Profile, Snapshot, TimeseriesId, WeightPolicy, ZoneId},
    ports::DemandModel,
};
use fdr_engine::{
    DemandParams,
    convergence::{Gap, lower_bound, previous_cost},
    demand::ConstantElasticity,
};
use proptest::prelude::*;

mod common;
use common::{baseline, one_day, zones};

fn energy(prices: &[f64]) -> Profile {
    [(Product::Energy, prices.to_vec())].into_iter().collect()
}

proptest! {
    // A demand model that maximizes its benefit net of cost never bids above the
    // cost of any mix of its earlier bids, so the lower bound holds.
    #[test]
    fn best_response_bounds_any_mix(
        marginal_cost in prop::collection::vec(5.0f64..500.0, 4),
        earlier in prop::collection::vec((prop::collection::vec(5.0f64..500.0, 4), 0.01f64..1.0), 1..5),
        elasticity in 0.0f64..0.9,
        elasticity_scenario in 0.0f64..10.0,
    ) {
        let timeline = one_day();
        let zones = zones();
        let baseline = baseline(150.0);
        let products = [Product::Energy];
        let series = timeline.timeseries().next().unwrap().clone();
        let zone: &ZoneId = &zones[0];

        let mut demand = ConstantElasticity::new(&DemandParams { elasticity, elasticity_scenario }).unwrap();
        demand.calibrate(&[baseline.series(zone, &series)]).unwrap();

        let mut ledger = BidLedger::new(&timeline, &zones, &products, WeightPolicy::default());
        let mut bid_at = |ledger: &mut BidLedger, prices: &[f64]| {
            let prices = energy(prices);
            let response = demand.bid(zone, &series, &prices).unwrap();
            let offers: Map<(ZoneId, TimeseriesId), Offer> = [(
                (zone.clone(), series.id.clone()),
                Offer { prices, quantities: response.quantities, benefit: response.benefit },
            )]
            .into_iter()
            .collect();
            ledger.append(offers).unwrap().id()
        };
        for (prices, _) in earlier.iter() {
            bid_at(&mut ledger, prices);
        }

        // the dispatch model's mix of the earlier bids, priced at `marginal_cost`
        let total: f64 = earlier.iter().map(|(_, w)| w).sum();
        let mut snapshot = Snapshot::default();
        for (i, timepoint) in series.timepoints.iter().enumerate() {
            let key = (zone.clone(), timepoint.clone(), Product::Energy);
            snapshot.marginal_cost.insert(key.clone(), marginal_cost[i]);
            for (bid, (_, w)) in ledger.iter().zip(earlier.iter()) {
                let weight = w / total;
                snapshot.demand.accumulate(key.clone(), weight * bid.quantity(zone, &series.id, Product::Energy, i));
                snapshot.welfare_cost.accumulate(timepoint.clone(), -weight * bid.benefit(zone, &series.id));
            }
        }

        let id = bid_at(&mut ledger, &marginal_cost);
        let best = lower_bound(&snapshot, ledger.get(id).unwrap(), &timeline, &zones, &products);
        let previous = previous_cost(&snapshot, &timeline, &zones, &products);
        let gap = Gap {
            previous_cost: previous.total(),
            best_cost: best.total(),
            baseline_expenditure: baseline.expenditure(&timeline, &zones),
        };
        prop_assert!(gap.relative() >= -1e-9, "relative gap {}", gap.relative());
        prop_assert!(!gap.violates_bound());
    }
}
