//! Run configuration.
//!
//! Settings are layered from their defaults, an optional TOML file and the
//! environment, in increasing order of precedence.

use fdr_csv::CsvConfig;
use fdr_engine::Settings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The prefix of environment variables read into the configuration
pub const ENV_PREFIX: &str = "FDR";

/// The configuration of a coordination run
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AppConfig {
    /// Pricing, stopping and demand model settings
    #[serde(default)]
    pub engine: Settings,

    /// Where the bid log and the reports go
    #[serde(default)]
    pub output: CsvConfig,
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. The config file, if given
    /// 3. Default values (lowest priority)
    ///
    /// Environment variables are mapped using the pattern
    /// `FDR_<SECTION>__<KEY>` to `<section>.<key>`:
    ///
    /// ```bash
    /// export FDR_ENGINE__PRICING="flat"
    /// export FDR_ENGINE__MAX_ITERATIONS=50
    /// export FDR_OUTPUT__OUTPUTS_DIR="/data/outputs"
    /// ```
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = file {
            if path.exists() {
                config = config.add_source(config::File::from(path))
            } else {
                return Err(anyhow::anyhow!(
                    "Config file {} does not exist",
                    path.display()
                ));
            }
        }

        config = config.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = config.build()?.try_deserialize()?;
        config.unify_tag(None);
        Ok(config)
    }

    /// Give the engine and the output files one tag.
    ///
    /// An explicit `tag` wins, then the output tag, then the engine tag.
    pub fn unify_tag(&mut self, tag: Option<String>) {
        let tag = tag
            .or_else(|| self.output.tag.take())
            .or_else(|| self.engine.tag.take())
            .filter(|tag| !tag.is_empty());
        self.output.tag = tag.clone();
        self.engine.tag = tag;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdr_engine::PricingMode;
    use std::io::Write as _;

    #[test]
    fn defaults_without_a_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.engine, Settings::default());
        assert_eq!(config.output.outputs_dir, Path::new("outputs"));
        assert!(config.output.tag.is_none());
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[engine]
pricing = "flat"
max_iterations = 20
time_budget = "1h"

[engine.demand]
elasticity = 0.2

[output]
outputs_dir = "runs"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.pricing, PricingMode::Flat);
        assert_eq!(config.engine.max_iterations, Some(20));
        assert_eq!(
            config.engine.time_budget,
            Some(std::time::Duration::from_secs(3600))
        );
        assert_eq!(config.engine.demand.elasticity, 0.2);
        assert_eq!(config.engine.demand.elasticity_scenario, 3.0);
        assert!(config.engine.seed_bids);
        assert_eq!(config.output.outputs_dir, Path::new("runs"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/fdr.toml"))).is_err());
    }

    #[test]
    fn engine_tag_names_the_outputs() {
        let mut config = AppConfig::default();
        config.engine.tag = Some("base".into());
        config.unify_tag(None);
        assert_eq!(config.output.tag.as_deref(), Some("base"));

        config.unify_tag(Some("high".into()));
        assert_eq!(config.engine.tag.as_deref(), Some("high"));
        assert_eq!(config.output.tag.as_deref(), Some("high"));
    }
}
