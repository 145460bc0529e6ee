use crate::AppConfig;
use clap::ValueEnum;
use fdr_csv::{CsvBidLog, CsvReporter};
use fdr_engine::{Controller, RunOutcome, demand::DemandCatalog};
use fdr_solver::{Backend, clarabel::ClarabelBackend, io::Scenario, osqp::OsqpBackend};

// This explicitly articulates the available solvers for the `run` subcommand
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SolverLib {
    Clarabel,
    Osqp,
}

impl SolverLib {
    pub async fn run(&self, scenario: Scenario, config: AppConfig) -> anyhow::Result<RunOutcome> {
        match self {
            SolverLib::Clarabel => coordinate(ClarabelBackend::default(), scenario, config).await,
            SolverLib::Osqp => coordinate(OsqpBackend::default(), scenario, config).await,
        }
    }
}

async fn coordinate<B: Backend>(
    backend: B,
    scenario: Scenario,
    config: AppConfig,
) -> anyhow::Result<RunOutcome> {
    let AppConfig { engine, output } = config;

    let timeline = scenario.timeline.clone();
    let zones = scenario.system.zones.clone();
    let (model, baseline) = scenario.into_model(backend, engine.weight_policy())?;
    let demand = DemandCatalog::default().load(&engine)?;

    let mut controller = Controller::new(
        engine,
        timeline,
        zones,
        baseline,
        model,
        demand,
        CsvBidLog::new(&output),
        CsvReporter::new(output),
    )?;
    Ok(controller.run().await?)
}
