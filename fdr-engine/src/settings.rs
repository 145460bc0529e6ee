use fdr_core::models::{Product, WeightPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the flexible demand is charged for energy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingMode {
    /// Every timepoint is charged its own marginal cost
    #[default]
    Dynamic,
    /// Every timepoint of a period is charged one revenue-neutral price
    Flat,
}

/// Parameters handed to the demand model constructor.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DemandParams {
    /// Price elasticity of the elastic share of load
    #[serde(default = "default_elasticity")]
    pub elasticity: f64,

    /// Shiftable share of load, in tenths (3 means 30%)
    #[serde(default = "default_elasticity_scenario")]
    pub elasticity_scenario: f64,
}

fn default_elasticity() -> f64 {
    0.1
}

fn default_elasticity_scenario() -> f64 {
    3.0
}

impl Default for DemandParams {
    fn default() -> Self {
        Self {
            elasticity: default_elasticity(),
            elasticity_scenario: default_elasticity_scenario(),
        }
    }
}

/// Configuration of a coordination run.
///
/// Every field has a default, so an empty configuration runs dynamic pricing with
/// seeding, resuming and the constant elasticity demand model.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Dynamic or flat pricing
    #[serde(default)]
    pub pricing: PricingMode,

    /// Give every zone its own bid weights instead of one system-wide weight
    #[serde(default)]
    pub zonal_weights: bool,

    /// Resume from the bid log of a previous run with the same tag
    #[serde(default = "default_true")]
    pub read_saved_bids: bool,

    /// Seed the bid list with synthetic price paths before iterating
    #[serde(default = "default_true")]
    pub seed_bids: bool,

    /// Reserve products the flexible demand may trade, on top of energy
    #[serde(default)]
    pub reserve_products: Vec<Product>,

    /// Stop once the gap between the current cost and its lower bound, relative
    /// to the baseline expenditure, is at most this value
    #[serde(default = "default_optimality_gap")]
    pub optimality_gap: f64,

    /// Stop after this many iterations, even without convergence
    #[serde(default)]
    pub max_iterations: Option<usize>,

    /// Stop once this much time has passed, even without convergence
    #[serde(default, with = "humantime_serde::option")]
    pub time_budget: Option<Duration>,

    /// Tolerance on bid weights outside [0, 1] before the run is aborted
    #[serde(default = "default_weight_slack")]
    pub weight_slack: f64,

    /// The name of the demand model in the catalog
    #[serde(default = "default_demand_module")]
    pub demand_module: Option<String>,

    /// Demand model parameters
    #[serde(default)]
    pub demand: DemandParams,

    /// The run tag, carried into the reports
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_optimality_gap() -> f64 {
    0.01
}

fn default_weight_slack() -> f64 {
    0.1
}

fn default_demand_module() -> Option<String> {
    Some(crate::demand::CONSTANT_ELASTICITY.to_owned())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pricing: PricingMode::default(),
            zonal_weights: false,
            read_saved_bids: true,
            seed_bids: true,
            reserve_products: Vec::new(),
            optimality_gap: default_optimality_gap(),
            max_iterations: None,
            time_budget: None,
            weight_slack: default_weight_slack(),
            demand_module: default_demand_module(),
            demand: DemandParams::default(),
            tag: None,
        }
    }
}

impl Settings {
    /// Whether flat pricing is active
    pub fn flat_pricing(&self) -> bool {
        self.pricing == PricingMode::Flat
    }

    /// Energy followed by the configured reserve products
    pub fn products(&self) -> Vec<Product> {
        Product::with_reserves(&self.reserve_products)
    }

    /// How bid weights are shared between zones and timeseries
    pub fn weight_policy(&self) -> WeightPolicy {
        WeightPolicy {
            zonal: self.zonal_weights,
            per_period: self.flat_pricing(),
        }
    }

    /// The run tag, or an empty string
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_configuration_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.products(), vec![Product::Energy]);
        assert_eq!(settings.weight_policy(), WeightPolicy::default());
    }

    #[test]
    fn flat_pricing_shares_weights_per_period() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "pricing": "flat",
                "zonal_weights": true,
                "reserve_products": ["energy up"],
                "time_budget": "2h 30m"
            }"#,
        )
        .unwrap();
        assert!(settings.flat_pricing());
        assert_eq!(
            settings.weight_policy(),
            WeightPolicy {
                zonal: true,
                per_period: true
            }
        );
        assert_eq!(settings.products(), vec![Product::Energy, Product::ReserveUp]);
        assert_eq!(settings.time_budget, Some(Duration::from_secs(9000)));
    }
}
