use super::DemandError;
use crate::DemandParams;
use fdr_core::{
    models::{CalibrationSeries, Map, Product, Profile, Timeseries, TimeseriesId, ZoneId},
    ports::{DemandModel, DemandResponse},
};

/// Prices are floored here before being raised to a negative power
const PRICE_FLOOR: f64 = 1.0;

/// A two-part demand system without reserves.
///
/// A share of each day's load is *shiftable*: its total is fixed, and it moves to
/// the cheapest timepoints of the timeseries, shaped like the base load there. Since
/// it is served in full at any price its relative willingness-to-pay is zero. The
/// rest is *elastic* with a constant own-price elasticity `ε` and no substitution
/// between timepoints:
///
/// ```text
/// q = (1 - share) · base_load · (p / base_price)^(-ε)
/// ```
///
/// The benefit is the change in consumer surplus plus the change in expenditure
/// relative to the baseline, averaged over the timepoints of the timeseries.
#[derive(Debug, Clone)]
pub struct ConstantElasticity {
    elasticity: f64,
    shiftable_share: f64,
    // (zone, timeseries) -> (base loads, base prices)
    calibration: Map<(ZoneId, TimeseriesId), (Vec<f64>, Vec<f64>)>,
}

impl ConstantElasticity {
    /// Validate the parameters; the model must be calibrated before it can bid
    pub fn new(params: &DemandParams) -> Result<Self, DemandError> {
        let elasticity = params.elasticity;
        if !(0.0..1.0).contains(&elasticity) {
            return Err(DemandError::InvalidParameter(format!(
                "elasticity must be in [0, 1), got {elasticity}"
            )));
        }
        let shiftable_share = 0.1 * params.elasticity_scenario;
        if !(0.0..=1.0).contains(&shiftable_share) {
            return Err(DemandError::InvalidParameter(format!(
                "elasticity scenario must be in [0, 10], got {}",
                params.elasticity_scenario
            )));
        }
        Ok(Self {
            elasticity,
            shiftable_share,
            calibration: Map::default(),
        })
    }
}

impl DemandModel for ConstantElasticity {
    type Error = DemandError;

    fn calibrate(&mut self, baseline: &[CalibrationSeries]) -> Result<(), Self::Error> {
        self.calibration = Map::with_capacity(baseline.len());
        for series in baseline {
            let valid = series.loads.len() == series.prices.len()
                && !series.loads.is_empty()
                && series.prices.iter().all(|&p| p.is_finite() && p > 0.0)
                && series.loads.iter().all(|&l| l.is_finite() && l >= 0.0);
            if !valid {
                return Err(DemandError::InvalidCalibration {
                    zone: series.zone.clone(),
                    timeseries: series.timeseries.clone(),
                });
            }
            self.calibration.insert(
                (series.zone.clone(), series.timeseries.clone()),
                (series.loads.clone(), series.prices.clone()),
            );
        }
        Ok(())
    }

    fn bid(
        &mut self,
        zone: &ZoneId,
        timeseries: &Timeseries,
        prices: &Profile,
    ) -> Result<DemandResponse, Self::Error> {
        let (base_load, base_price) = self
            .calibration
            .get(&(zone.clone(), timeseries.id.clone()))
            .ok_or_else(|| DemandError::NotCalibrated {
                zone: zone.clone(),
                timeseries: timeseries.id.clone(),
            })?;
        let n = base_load.len();
        let invalid = || DemandError::InvalidCalibration {
            zone: zone.clone(),
            timeseries: timeseries.id.clone(),
        };

        let energy = prices.get(Product::Energy).ok_or_else(invalid)?;
        if energy.len() != n || energy.iter().any(|p| p.is_nan()) {
            return Err(invalid());
        }
        let p: Vec<f64> = energy.iter().map(|&p| p.max(PRICE_FLOOR)).collect();

        // shiftable load goes to every minimum-price timepoint, shaped like the base load
        let lowest = p.iter().copied().fold(f64::INFINITY, f64::min);
        let cheapest: Vec<bool> = p.iter().map(|&price| price == lowest).collect();
        let total_load: f64 = base_load.iter().sum();
        let cheapest_load: f64 = base_load
            .iter()
            .zip(&cheapest)
            .filter_map(|(&load, &is_cheapest)| is_cheapest.then_some(load))
            .sum();
        let cheapest_count = cheapest.iter().filter(|&&c| c).count() as f64;
        let shiftable: Vec<f64> = base_load
            .iter()
            .zip(&cheapest)
            .map(|(&load, &is_cheapest)| {
                if !is_cheapest {
                    0.0
                } else if cheapest_load > 0.0 {
                    self.shiftable_share * total_load * load / cheapest_load
                } else {
                    self.shiftable_share * total_load / cheapest_count
                }
            })
            .collect();

        let e = self.elasticity;
        let mut surplus_change = 0.0;
        let mut paid = 0.0;
        let mut base_paid = 0.0;
        let mut demand = Vec::with_capacity(n);
        for i in 0..n {
            let elastic_base = (1.0 - self.shiftable_share) * base_load[i];
            let ratio = p[i] / base_price[i];
            let elastic = elastic_base * ratio.powf(-e);
            surplus_change += (1.0 - ratio.powf(1.0 - e)) * base_price[i] * elastic_base / (1.0 - e);
            paid += p[i] * elastic;
            base_paid += base_price[i] * elastic_base;
            demand.push(shiftable[i] + elastic);
        }
        let benefit = (surplus_change + paid - base_paid) / n as f64;

        let products: Vec<Product> = prices.products().collect();
        let quantities = Profile::from_fn(&products, n, |product, i| match product {
            Product::Energy => demand[i],
            _ => 0.0,
        });
        Ok(DemandResponse {
            quantities,
            benefit,
        })
    }
}
