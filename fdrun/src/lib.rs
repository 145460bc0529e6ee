use clap::Parser;
use fdr_solver::io::Scenario;
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing::{Level, event};

mod config;
pub use config::{AppConfig, ENV_PREFIX};

mod commands;
pub use commands::*;

// The top-level arguments -- presently just which subcommand to execute
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct BaseArgs {
    #[command(subcommand)]
    pub command: Commands,
}

impl BaseArgs {
    pub async fn evaluate(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Run {
                scenario,
                config,
                lib,
                tag,
            } => {
                let mut config = AppConfig::load(config.as_deref())?;
                config.unify_tag(tag);
                let scenario = read_scenario(scenario)?;
                event!(
                    Level::INFO,
                    pricing = ?config.engine.pricing,
                    tag = config.engine.tag(),
                    ?lib,
                    "starting coordination run"
                );

                let outcome = lib.run(scenario, config).await?;
                let report = serde_json::json!({
                    "phase": format!("{:?}", outcome.phase),
                    "iterations": outcome.iterations,
                    "bids": outcome.bids,
                    "gap": outcome.gap,
                    "total_cost": outcome.summary.total_cost,
                });
                serde_json::to_writer_pretty(std::io::stdout(), &report)?;
            }
            Commands::Inspect { bid_log } => {
                let digest = LogDigest::read(&bid_log)?;
                serde_json::to_writer_pretty(std::io::stdout(), &digest)?;
            }
            Commands::Seeds { flat } => {
                let seeds = SeedDigest::list(flat);
                serde_json::to_writer_pretty(std::io::stdout(), &seeds)?;
            }
        }

        Ok(())
    }
}

fn read_scenario(path: PathBuf) -> anyhow::Result<Scenario> {
    let file = File::open(&path).map_err(|source| CliError::Scenario { path, source })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Unable to open scenario {}: {source}", .path.display())]
    Scenario {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("The bid log {} holds no bids", .0.display())]
    EmptyLog(PathBuf),
}
