use crate::{Backend, DispatchSystem, MasterProblem, ModelError};
use fdr_core::models::{Baseline, BaselinePoint, Timeline, TimepointId, WeightPolicy, ZoneId};
use serde::{Deserialize, Serialize};

/// One baseline entry of a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineEntry {
    /// The zone
    pub zone: ZoneId,
    /// The timepoint
    pub timepoint: TimepointId,
    /// Reference load, in MW
    pub load: f64,
    /// Reference price, in $/MWh
    pub price: f64,
}

/// a self-contained description of a coordination run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// the periods, timeseries and timepoints
    pub timeline: Timeline,
    /// the physical system
    pub system: DispatchSystem,
    /// the baseline load and price of every zone and timepoint
    pub baseline: Vec<BaselineEntry>,
}

impl Scenario {
    /// the baseline calibration
    pub fn baseline(&self) -> Baseline {
        self.baseline
            .iter()
            .map(|entry| {
                (
                    (entry.zone.clone(), entry.timepoint.clone()),
                    BaselinePoint {
                        load: entry.load,
                        price: entry.price,
                    },
                )
            })
            .collect()
    }

    /// build the reference dispatch model for the scenario
    pub fn into_model<B: Backend>(
        self,
        backend: B,
        policy: WeightPolicy,
    ) -> Result<(MasterProblem<B>, Baseline), ModelError> {
        let baseline = self.baseline();
        let model = MasterProblem::new(backend, self.timeline, self.system, policy)?;
        Ok((model, baseline))
    }
}
