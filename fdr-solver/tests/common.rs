#![allow(dead_code)]
use fdr_core::models::{
    BidLedger, Map, Offer, Period, Product, Profile, Timeline, Timeseries, TimeseriesId,
    WeightPolicy, ZoneId,
};
use fdr_solver::{DispatchSystem, Generator, Line};

/// A single hour in a single period, with unit weights so that duals are prices
pub fn one_hour() -> Timeline {
    Timeline::new(
        vec![Period {
            id: "2030".into(),
            annual_to_npv: 1.0,
        }],
        vec![Timeseries {
            id: "day".into(),
            period: "2030".into(),
            duration_hours: 1.0,
            scale_to_year: 1.0,
            timepoints: vec!["t1".into()],
        }],
    )
    .unwrap()
}

/// A day of four six-hour timepoints, weighted to a year and discounted to present value
pub fn present_value_day() -> Timeline {
    Timeline::new(
        vec![Period {
            id: "2030".into(),
            annual_to_npv: 7.5,
        }],
        vec![Timeseries {
            id: "day".into(),
            period: "2030".into(),
            duration_hours: 6.0,
            scale_to_year: 365.0,
            timepoints: vec!["h00".into(), "h06".into(), "h12".into(), "h18".into()],
        }],
    )
    .unwrap()
}

pub fn generator(name: &str, zone: &str, capacity: f64, marginal_cost: f64) -> Generator {
    Generator {
        name: name.into(),
        zone: zone.into(),
        capacity,
        availability: Map::default(),
        marginal_cost,
        quadratic_cost: 0.0,
        reserve_capable: false,
    }
}

/// One zone with a cheap 5 MW unit at $10 and an expensive 10 MW unit at $20
pub fn two_units() -> DispatchSystem {
    DispatchSystem {
        zones: vec!["z".into()],
        generators: vec![
            generator("cheap", "z", 5.0, 10.0),
            generator("dear", "z", 10.0, 20.0),
        ],
        lines: vec![],
        reserves: vec![],
        fixed_load: vec![],
        unserved_energy_penalty: 1000.0,
    }
}

/// Two zones joined by a 2 MW line
pub fn two_zones() -> DispatchSystem {
    DispatchSystem {
        zones: vec!["a".into(), "b".into()],
        generators: vec![
            generator("a-unit", "a", 10.0, 10.0),
            generator("b-unit", "b", 10.0, 30.0),
        ],
        lines: vec![Line {
            name: "a-b".into(),
            from: "a".into(),
            to: "b".into(),
            capacity: 2.0,
        }],
        reserves: vec![],
        fixed_load: vec![],
        unserved_energy_penalty: 1000.0,
    }
}

/// Append a bid with the same per-zone quantities and benefit at every timepoint
pub fn append_bid(
    ledger: &mut BidLedger,
    timeline: &Timeline,
    zones: &[ZoneId],
    quantities: &[(Product, f64)],
    benefit: f64,
) {
    let offers: Map<(ZoneId, TimeseriesId), Offer> = zones
        .iter()
        .flat_map(|zone| {
            timeline.timeseries().map(move |ts| {
                (
                    (zone.clone(), ts.id.clone()),
                    Offer {
                        prices: Profile::default(),
                        quantities: quantities
                            .iter()
                            .map(|&(product, q)| (product, vec![q; ts.len()]))
                            .collect(),
                        benefit,
                    },
                )
            })
        })
        .collect();
    ledger.append(offers).unwrap();
}

pub fn ledger(timeline: &Timeline, zones: &[ZoneId], products: &[Product]) -> BidLedger {
    BidLedger::new(timeline, zones, products, WeightPolicy::default())
}

/// Append an energy-only bid with a different quantity per zone
pub fn append_zonal_bid(
    ledger: &mut BidLedger,
    timeline: &Timeline,
    quantities: &[(&str, f64)],
    benefit: f64,
) {
    let offers: Map<(ZoneId, TimeseriesId), Offer> = quantities
        .iter()
        .flat_map(|&(zone, q)| {
            timeline.timeseries().map(move |ts| {
                (
                    (ZoneId::from(zone), ts.id.clone()),
                    Offer {
                        prices: Profile::default(),
                        quantities: [(Product::Energy, vec![q; ts.len()])].into_iter().collect(),
                        benefit,
                    },
                )
            })
        })
        .collect();
    ledger.append(offers).unwrap();
}
