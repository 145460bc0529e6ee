#![allow(dead_code)]
use fdr_core::{
    models::{Baseline, BaselinePoint, Map, Period, Timeline, Timeseries, WeightPolicy, ZoneId},
    ports::{DemandModel, DispatchModel},
};
use fdr_csv::{CsvBidLog, CsvConfig, CsvReporter};
use fdr_engine::{Controller, Settings, demand::ConstantElasticity};
use fdr_solver::{DispatchSystem, Generator, MasterProblem, clarabel::ClarabelBackend};
use std::path::Path;

pub type TestController =
    Controller<MasterProblem<ClarabelBackend>, ConstantElasticity, CsvBidLog, CsvReporter>;

/// One period with a single day of four six-hour timepoints
pub fn one_day() -> Timeline {
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

pub fn zones() -> Vec<ZoneId> {
    vec!["oahu".into()]
}

/// The same price at every timepoint, with a daily load shape
pub fn baseline(price: f64) -> Baseline {
    [("h00", 80.0), ("h06", 100.0), ("h12", 120.0), ("h18", 140.0)]
        .into_iter()
        .map(|(tp, load)| (("oahu".into(), tp.into()), BaselinePoint { load, price }))
        .collect()
}

pub fn generator(name: &str, capacity: f64, marginal_cost: f64, quadratic_cost: f64) -> Generator {
    Generator {
        name: name.into(),
        zone: "oahu".into(),
        capacity,
        availability: Map::default(),
        marginal_cost,
        quadratic_cost,
        reserve_capable: false,
    }
}

/// A single unit that sets the price at 180 whatever the load
pub fn flat_supply() -> DispatchSystem {
    DispatchSystem {
        zones: zones(),
        generators: vec![generator("peaker", 1000.0, 180.0, 0.0)],
        lines: vec![],
        reserves: vec![],
        fixed_load: vec![],
        unserved_energy_penalty: 10_000.0,
    }
}

/// A baseload unit and a rising-cost peaker
pub fn rising_supply() -> DispatchSystem {
    DispatchSystem {
        zones: zones(),
        generators: vec![
            generator("baseload", 90.0, 40.0, 0.0),
            generator("peaker", 500.0, 120.0, 2.0),
        ],
        lines: vec![],
        reserves: vec![],
        fixed_load: vec![],
        unserved_energy_penalty: 10_000.0,
    }
}

/// The reference dispatch model over [`one_day`]
pub fn model(settings: &Settings, system: DispatchSystem) -> MasterProblem<ClarabelBackend> {
    MasterProblem::new(
        ClarabelBackend::default(),
        one_day(),
        system,
        settings.weight_policy(),
    )
    .unwrap()
}

/// A controller over [`one_day`] with any dispatch and demand model, logging to `dir`
pub fn assemble<M: DispatchModel, D: DemandModel>(
    settings: Settings,
    model: M,
    demand: D,
    baseline: Baseline,
    dir: &Path,
) -> Controller<M, D, CsvBidLog, CsvReporter> {
    let config = CsvConfig {
        outputs_dir: dir.to_owned(),
        tag: settings.tag.clone(),
    };
    Controller::new(
        settings,
        one_day(),
        zones(),
        baseline,
        model,
        demand,
        CsvBidLog::new(&config),
        CsvReporter::new(config),
    )
    .unwrap()
}

pub fn controller(
    settings: Settings,
    system: DispatchSystem,
    price: f64,
    dir: &Path,
) -> TestController {
    let model = model(&settings, system);
    let demand = ConstantElasticity::new(&settings.demand).unwrap();
    assemble(settings, model, demand, baseline(price), dir)
}

pub fn policy(settings: &Settings) -> WeightPolicy {
    settings.weight_policy()
}
