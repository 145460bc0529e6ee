use fdr_core::models::{Map, Product, Timeline, TimepointId, ZoneId};
use thiserror::Error;

/// A dispatchable generator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Generator {
    /// A label, used in error messages
    pub name: String,
    /// The zone the generator injects into
    pub zone: ZoneId,
    /// Nameplate capacity, in MW
    pub capacity: f64,
    /// Available fraction of capacity per timepoint; absent timepoints are fully available
    #[cfg_attr(feature = "serde", serde(default))]
    pub availability: Map<TimepointId>,
    /// Linear cost, in $/MWh
    pub marginal_cost: f64,
    /// Quadratic cost coefficient, in $/MW²h; the cost of output g is `c1 g + ½ c2 g²`
    #[cfg_attr(feature = "serde", serde(default))]
    pub quadratic_cost: f64,
    /// Whether the generator may hold spinning reserve
    #[cfg_attr(feature = "serde", serde(default))]
    pub reserve_capable: bool,
}

impl Generator {
    /// The capacity available at a timepoint
    pub fn available(&self, timepoint: &TimepointId) -> f64 {
        self.capacity * self.availability.get(timepoint).copied().unwrap_or(1.0)
    }
}

/// A transmission corridor between two zones, modeled as a transport link.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Line {
    /// A label, used in error messages
    pub name: String,
    /// The sending zone (positive flow direction)
    pub from: ZoneId,
    /// The receiving zone
    pub to: ZoneId,
    /// Transfer capacity in either direction, in MW
    pub capacity: f64,
}

/// A system-wide reserve requirement at one timepoint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReserveRequirement {
    /// The reserve product
    pub product: Product,
    /// The timepoint
    pub timepoint: TimepointId,
    /// The required quantity, in MW
    pub quantity: f64,
}

/// Load that does not respond to prices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedLoad {
    /// The zone
    pub zone: ZoneId,
    /// The timepoint
    pub timepoint: TimepointId,
    /// The load, in MW
    pub load: f64,
}

fn default_penalty() -> f64 {
    10_000.0
}

/// The physical system the reference dispatch model operates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispatchSystem {
    /// The load zones
    pub zones: Vec<ZoneId>,
    /// The generators
    pub generators: Vec<Generator>,
    /// The transmission lines
    #[cfg_attr(feature = "serde", serde(default))]
    pub lines: Vec<Line>,
    /// The reserve requirements
    #[cfg_attr(feature = "serde", serde(default))]
    pub reserves: Vec<ReserveRequirement>,
    /// Price-insensitive load, on top of the flexible demand
    #[cfg_attr(feature = "serde", serde(default))]
    pub fixed_load: Vec<FixedLoad>,
    /// The cost of unserved energy, in $/MWh
    #[cfg_attr(feature = "serde", serde(default = "default_penalty"))]
    pub unserved_energy_penalty: f64,
}

impl DispatchSystem {
    /// Check that the system is consistent with itself and with the timeline
    pub fn validate(&self, timeline: &Timeline) -> Result<(), SystemError> {
        if self.zones.is_empty() {
            return Err(SystemError::NoZones);
        }
        for (i, zone) in self.zones.iter().enumerate() {
            if self.zones[..i].contains(zone) {
                return Err(SystemError::DuplicateZone(zone.clone()));
            }
        }
        let known_zone = |zone: &ZoneId| {
            if self.zones.contains(zone) {
                Ok(())
            } else {
                Err(SystemError::UnknownZone(zone.clone()))
            }
        };
        let known_timepoint = |timepoint: &TimepointId| {
            if timeline.locate(timepoint).is_some() {
                Ok(())
            } else {
                Err(SystemError::UnknownTimepoint(timepoint.clone()))
            }
        };
        let nonnegative = |name: &str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(SystemError::InvalidValue(name.to_owned()))
            }
        };

        for generator in self.generators.iter() {
            known_zone(&generator.zone)?;
            nonnegative(&generator.name, generator.capacity)?;
            nonnegative(&generator.name, generator.quadratic_cost)?;
            if !generator.marginal_cost.is_finite() {
                return Err(SystemError::InvalidValue(generator.name.clone()));
            }
            for (timepoint, &factor) in generator.availability.iter() {
                known_timepoint(timepoint)?;
                nonnegative(&generator.name, factor)?;
            }
        }
        for line in self.lines.iter() {
            known_zone(&line.from)?;
            known_zone(&line.to)?;
            nonnegative(&line.name, line.capacity)?;
        }
        for requirement in self.reserves.iter() {
            if !requirement.product.is_reserve() {
                return Err(SystemError::NotAReserve(requirement.product));
            }
            known_timepoint(&requirement.timepoint)?;
            nonnegative(requirement.product.as_str(), requirement.quantity)?;
        }
        for load in self.fixed_load.iter() {
            known_zone(&load.zone)?;
            known_timepoint(&load.timepoint)?;
            nonnegative(load.zone.as_str(), load.load)?;
        }
        if !(self.unserved_energy_penalty.is_finite() && self.unserved_energy_penalty > 0.0) {
            return Err(SystemError::InvalidValue("unserved_energy_penalty".into()));
        }
        Ok(())
    }

    /// The reserve products with at least one requirement, in first-mention order
    pub fn reserve_products(&self) -> Vec<Product> {
        let mut products = Vec::new();
        for requirement in self.reserves.iter() {
            if !products.contains(&requirement.product) {
                products.push(requirement.product);
            }
        }
        products
    }

    /// The total requirement of a reserve product at a timepoint
    pub fn requirement(&self, product: Product, timepoint: &TimepointId) -> f64 {
        self.reserves
            .iter()
            .filter(|r| r.product == product && &r.timepoint == timepoint)
            .map(|r| r.quantity)
            .sum()
    }

    /// The fixed load of a zone at a timepoint
    pub fn fixed_load(&self, zone: &ZoneId, timepoint: &TimepointId) -> f64 {
        self.fixed_load
            .iter()
            .filter(|l| &l.zone == zone && &l.timepoint == timepoint)
            .map(|l| l.load)
            .sum()
    }
}

/// The ways a system description may be invalid.
#[derive(Debug, Error, PartialEq)]
pub enum SystemError {
    /// The system has no zones
    #[error("the system has no load zones")]
    NoZones,
    /// A zone is listed twice
    #[error("duplicate zone {0}")]
    DuplicateZone(ZoneId),
    /// An element refers to an unknown zone
    #[error("unknown zone {0}")]
    UnknownZone(ZoneId),
    /// An element refers to an unknown timepoint
    #[error("unknown timepoint {0}")]
    UnknownTimepoint(TimepointId),
    /// A requirement is given for energy instead of a reserve product
    #[error("{0} is not a reserve product")]
    NotAReserve(Product),
    /// A capacity, cost or quantity is negative or not finite
    #[error("invalid value for {0}")]
    InvalidValue(String),
}
