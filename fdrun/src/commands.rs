use clap::Subcommand;
use std::path::PathBuf;

mod inspect;
pub use inspect::{BidDigest, LogDigest};

mod run;
pub use run::SolverLib;

mod seeds;
pub use seeds::SeedDigest;

#[derive(Subcommand)]
pub enum Commands {
    /// Coordinate flexible demand with the dispatch model of a scenario
    Run {
        /// The scenario file (JSON): timeline, system and baseline
        scenario: PathBuf,

        /// A TOML configuration file, layered between defaults and environment
        #[arg(short, long, env = "FDR_CONFIG")]
        config: Option<PathBuf>,

        /// Request a specific QP solver
        #[arg(short, long, default_value = "clarabel")]
        lib: SolverLib,

        /// The run tag, overriding the configured one
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Summarize the bids of a bid log
    Inspect {
        /// The bid log (CSV)
        bid_log: PathBuf,
    },

    /// List the shapes of the seed bids
    Seeds {
        /// Only the seeds used under flat pricing
        #[arg(long)]
        flat: bool,
    },
}
