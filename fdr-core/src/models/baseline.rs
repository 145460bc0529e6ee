use crate::models::{Map, Timeline, TimepointId, Timeseries, TimeseriesId, ZoneId};
use thiserror::Error;

/// The reference load and price of one zone at one timepoint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaselinePoint {
    /// Reference load, in MW
    pub load: f64,
    /// Reference price, in $/MWh
    pub price: f64,
}

/// The fixed reference load and price used to calibrate the demand model.
///
/// The baseline is computed once before the first iteration and never changes.
/// It also normalizes the convergence tolerance through [`Baseline::expenditure`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baseline(Map<(ZoneId, TimepointId), BaselinePoint>);

/// The baseline of one (zone, timeseries), as handed to the demand model.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSeries {
    /// The zone
    pub zone: ZoneId,
    /// The timeseries
    pub timeseries: TimeseriesId,
    /// Reference loads, ordered like the timepoints of the series
    pub loads: Vec<f64>,
    /// Reference prices, ordered like the timepoints of the series
    pub prices: Vec<f64>,
}

impl Baseline {
    /// The reference point of a zone at a timepoint
    pub fn get(&self, zone: &ZoneId, timepoint: &TimepointId) -> Option<BaselinePoint> {
        self.0.get(&(zone.clone(), timepoint.clone())).copied()
    }

    /// Check that every (zone, timepoint) has a finite, non-negative reference point
    pub fn validate(&self, timeline: &Timeline, zones: &[ZoneId]) -> Result<(), BaselineError> {
        for zone in zones {
            for (_, _, timepoint) in timeline.timepoints() {
                let point = self.get(zone, timepoint).ok_or_else(|| BaselineError::Missing {
                    zone: zone.clone(),
                    timepoint: timepoint.clone(),
                })?;
                if !(point.load.is_finite() && point.price.is_finite() && point.load >= 0.0) {
                    return Err(BaselineError::Invalid {
                        zone: zone.clone(),
                        timepoint: timepoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The present value of buying the baseline load at the baseline price
    pub fn expenditure(&self, timeline: &Timeline, zones: &[ZoneId]) -> f64 {
        zones
            .iter()
            .flat_map(|zone| {
                timeline.timepoints().map(move |(series, _, timepoint)| {
                    self.get(zone, timepoint)
                        .map(|p| p.load * p.price * timeline.npv_weight(series))
                        .unwrap_or(0.0)
                })
            })
            .sum()
    }

    /// The baseline of one zone over one timeseries
    pub fn series(&self, zone: &ZoneId, series: &Timeseries) -> CalibrationSeries {
        let (loads, prices) = series
            .timepoints
            .iter()
            .map(|tp| {
                self.get(zone, tp)
                    .map(|p| (p.load, p.price))
                    .unwrap_or((0.0, 0.0))
            })
            .unzip();
        CalibrationSeries {
            zone: zone.clone(),
            timeseries: series.id.clone(),
            loads,
            prices,
        }
    }

    /// The average reference price of a zone over a timeseries
    pub fn average_price(&self, zone: &ZoneId, series: &Timeseries) -> f64 {
        let prices = self.series(zone, series).prices;
        prices.iter().sum::<f64>() / prices.len().max(1) as f64
    }
}

impl FromIterator<((ZoneId, TimepointId), BaselinePoint)> for Baseline {
    fn from_iter<I: IntoIterator<Item = ((ZoneId, TimepointId), BaselinePoint)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The ways a baseline may fail to cover the run.
#[derive(Debug, Error, PartialEq)]
pub enum BaselineError {
    /// No reference point for a (zone, timepoint)
    #[error("no baseline load and price for zone {zone} at timepoint {timepoint}")]
    Missing {
        /// The zone
        zone: ZoneId,
        /// The timepoint
        timepoint: TimepointId,
    },
    /// A reference point is negative or not finite
    #[error("invalid baseline load or price for zone {zone} at timepoint {timepoint}")]
    Invalid {
        /// The zone
        zone: ZoneId,
        /// The timepoint
        timepoint: TimepointId,
    },
}
