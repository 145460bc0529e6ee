use crate::{DemandParams, EngineError, Settings};
use fdr_core::{
    models::{Map, TimeseriesId, ZoneId},
    ports::DemandModel,
};
use thiserror::Error;

mod constant_elasticity;
pub use constant_elasticity::ConstantElasticity;

/// The catalog name of [`ConstantElasticity`]
pub const CONSTANT_ELASTICITY: &str = "constant_elasticity";

/// A demand model loaded from the catalog
pub type BoxedDemandModel = Box<dyn DemandModel<Error = DemandError> + Send>;

/// Builds a demand model from its parameters
pub type DemandConstructor = fn(&DemandParams) -> Result<BoxedDemandModel, DemandError>;

/// The demand models a run can choose from, by name.
///
/// The default catalog holds [`ConstantElasticity`] under [`CONSTANT_ELASTICITY`].
/// Other models are made available with [`DemandCatalog::register`].
#[derive(Debug, Clone)]
pub struct DemandCatalog {
    modules: Map<String, DemandConstructor>,
}

impl Default for DemandCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register(CONSTANT_ELASTICITY, constant_elasticity);
        catalog
    }
}

fn constant_elasticity(params: &DemandParams) -> Result<BoxedDemandModel, DemandError> {
    Ok(Box::new(ConstantElasticity::new(params)?))
}

impl DemandCatalog {
    /// A catalog without any model
    pub fn empty() -> Self {
        Self {
            modules: Map::default(),
        }
    }

    /// Make a model available under `name`, replacing any previous entry
    pub fn register(&mut self, name: &str, constructor: DemandConstructor) {
        self.modules.insert(name.to_owned(), constructor);
    }

    /// The names of the active modules
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Build the model named by `settings.demand_module`
    pub fn load(&self, settings: &Settings) -> Result<BoxedDemandModel, EngineError> {
        let name = settings
            .demand_module
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(EngineError::NoDemandModule)?;
        let constructor =
            self.modules
                .get(name)
                .ok_or_else(|| EngineError::DemandModuleNotLoaded {
                    name: name.to_owned(),
                    available: self.names().collect::<Vec<_>>().join(", "),
                })?;
        constructor(&settings.demand).map_err(EngineError::demand)
    }
}

/// The ways a demand model can fail.
#[derive(Debug, Error, PartialEq)]
pub enum DemandError {
    /// A parameter is out of its valid range
    #[error("invalid demand parameter: {0}")]
    InvalidParameter(String),

    /// A bid was requested for a (zone, timeseries) that was not calibrated
    #[error("no calibration for zone {zone}, timeseries {timeseries}")]
    NotCalibrated {
        /// The zone
        zone: ZoneId,
        /// The timeseries
        timeseries: TimeseriesId,
    },

    /// The calibration data or the prices have the wrong shape or values
    #[error("invalid calibration or prices for zone {zone}, timeseries {timeseries}")]
    InvalidCalibration {
        /// The zone
        zone: ZoneId,
        /// The timeseries
        timeseries: TimeseriesId,
    },
}
