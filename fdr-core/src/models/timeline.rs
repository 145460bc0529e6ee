use crate::models::{Map, PeriodId, TimepointId, TimeseriesId};
use thiserror::Error;

/// An investment period.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Period {
    /// The period identifier
    pub id: PeriodId,
    /// The factor that converts one year of costs incurred during this period into
    /// base-year present value (period length and discounting combined)
    pub annual_to_npv: f64,
}

/// A representative sequence of equally long timepoints, e.g. a sample day.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timeseries {
    /// The timeseries identifier
    pub id: TimeseriesId,
    /// The period this timeseries represents
    pub period: PeriodId,
    /// The length of each timepoint, in hours
    pub duration_hours: f64,
    /// How many times this timeseries occurs in a year
    pub scale_to_year: f64,
    /// The timepoints, in chronological order
    pub timepoints: Vec<TimepointId>,
}

impl Timeseries {
    /// The number of hours per year each timepoint of this series stands for
    pub fn weight_in_year(&self) -> f64 {
        self.duration_hours * self.scale_to_year
    }

    /// The number of timepoints
    pub fn len(&self) -> usize {
        self.timepoints.len()
    }

    /// Whether the series has no timepoints (never true for a validated timeline)
    pub fn is_empty(&self) -> bool {
        self.timepoints.is_empty()
    }
}

/// The set of periods, timeseries and timepoints a run is defined over.
///
/// Every timepoint belongs to exactly one timeseries, and every timeseries to exactly
/// one period. The timeline also derives the time scaling factor that converts the
/// present-value dual of a balance constraint into a price per unit:
/// `npv_weight = duration_hours * scale_to_year * annual_to_npv`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RawTimeline", into = "RawTimeline")
)]
pub struct Timeline {
    periods: Map<PeriodId, Period>,
    timeseries: Map<TimeseriesId, Timeseries>,
    // timepoint -> (index of its timeseries, position within the timeseries)
    index: Map<TimepointId, (usize, usize)>,
}

impl Timeline {
    /// Validate and index the periods and timeseries
    pub fn new(periods: Vec<Period>, timeseries: Vec<Timeseries>) -> Result<Self, TimelineError> {
        let mut period_map = Map::with_capacity(periods.len());
        for period in periods {
            if !(period.annual_to_npv.is_finite() && period.annual_to_npv > 0.0) {
                return Err(TimelineError::InvalidDiscount(period.id));
            }
            if period_map.contains_key(&period.id) {
                return Err(TimelineError::DuplicatePeriod(period.id));
            }
            period_map.insert(period.id.clone(), period);
        }

        let mut series_map = Map::with_capacity(timeseries.len());
        let mut index = Map::default();
        for series in timeseries {
            if !period_map.contains_key(&series.period) {
                return Err(TimelineError::UnknownPeriod {
                    timeseries: series.id,
                    period: series.period,
                });
            }
            if series.timepoints.is_empty() {
                return Err(TimelineError::EmptyTimeseries(series.id));
            }
            if !(series.duration_hours.is_finite() && series.duration_hours > 0.0) {
                return Err(TimelineError::InvalidDuration(series.id));
            }
            if !(series.scale_to_year.is_finite() && series.scale_to_year > 0.0) {
                return Err(TimelineError::InvalidScale(series.id));
            }
            if series_map.contains_key(&series.id) {
                return Err(TimelineError::DuplicateTimeseries(series.id));
            }

            let position = series_map.len();
            for (i, timepoint) in series.timepoints.iter().enumerate() {
                if index.insert(timepoint.clone(), (position, i)).is_some() {
                    return Err(TimelineError::DuplicateTimepoint(timepoint.clone()));
                }
            }
            series_map.insert(series.id.clone(), series);
        }

        Ok(Self {
            periods: period_map,
            timeseries: series_map,
            index,
        })
    }

    /// The periods, in declaration order
    pub fn periods(&self) -> impl Iterator<Item = &Period> {
        self.periods.values()
    }

    /// Look up a period
    pub fn period(&self, id: &PeriodId) -> Option<&Period> {
        self.periods.get(id)
    }

    /// All timeseries, in declaration order
    pub fn timeseries(&self) -> impl Iterator<Item = &Timeseries> {
        self.timeseries.values()
    }

    /// Look up a timeseries
    pub fn series(&self, id: &TimeseriesId) -> Option<&Timeseries> {
        self.timeseries.get(id)
    }

    /// The timeseries belonging to a period
    pub fn series_in<'a>(&'a self, period: &'a PeriodId) -> impl Iterator<Item = &'a Timeseries> {
        self.timeseries.values().filter(move |ts| &ts.period == period)
    }

    /// Every timepoint with its timeseries and position, in chronological order per series
    pub fn timepoints(&self) -> impl Iterator<Item = (&Timeseries, usize, &TimepointId)> {
        self.timeseries.values().flat_map(|ts| {
            ts.timepoints
                .iter()
                .enumerate()
                .map(move |(i, tp)| (ts, i, tp))
        })
    }

    /// The number of timepoints
    pub fn timepoint_count(&self) -> usize {
        self.index.len()
    }

    /// Find the timeseries and position of a timepoint
    pub fn locate(&self, timepoint: &TimepointId) -> Option<(&Timeseries, usize)> {
        let &(series, position) = self.index.get(timepoint)?;
        let (_, ts) = self.timeseries.get_index(series)?;
        Some((ts, position))
    }

    /// The present-value weight of each timepoint in `series`
    pub fn npv_weight(&self, series: &Timeseries) -> f64 {
        let annual_to_npv = self
            .periods
            .get(&series.period)
            .map(|p| p.annual_to_npv)
            .unwrap_or(1.0);
        series.weight_in_year() * annual_to_npv
    }

    /// Convert a present-value amount incurred in `period` back to an annual amount
    pub fn to_annual(&self, period: &PeriodId, npv: f64) -> f64 {
        match self.periods.get(period) {
            Some(p) => npv / p.annual_to_npv,
            None => npv,
        }
    }
}

/// The ways in which a timeline definition may be invalid.
#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    /// The same period id was given twice
    #[error("duplicate period {0}")]
    DuplicatePeriod(PeriodId),
    /// A period's present-value factor is not a positive number
    #[error("period {0} must have a positive, finite present-value factor")]
    InvalidDiscount(PeriodId),
    /// The same timeseries id was given twice
    #[error("duplicate timeseries {0}")]
    DuplicateTimeseries(TimeseriesId),
    /// A timeseries refers to a period that does not exist
    #[error("timeseries {timeseries} refers to unknown period {period}")]
    UnknownPeriod {
        /// The offending timeseries
        timeseries: TimeseriesId,
        /// The missing period
        period: PeriodId,
    },
    /// A timeseries has no timepoints
    #[error("timeseries {0} has no timepoints")]
    EmptyTimeseries(TimeseriesId),
    /// A timeseries has a non-positive timepoint duration
    #[error("timeseries {0} must have a positive duration")]
    InvalidDuration(TimeseriesId),
    /// A timeseries has a non-positive annual scale
    #[error("timeseries {0} must have a positive scale to year")]
    InvalidScale(TimeseriesId),
    /// A timepoint appears more than once
    #[error("timepoint {0} appears in more than one place")]
    DuplicateTimepoint(TimepointId),
}

/// The "DTO" type for the timeline
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawTimeline {
    /// The periods
    pub periods: Vec<Period>,
    /// The timeseries
    pub timeseries: Vec<Timeseries>,
}

impl TryFrom<RawTimeline> for Timeline {
    type Error = TimelineError;

    fn try_from(value: RawTimeline) -> Result<Self, Self::Error> {
        Timeline::new(value.periods, value.timeseries)
    }
}

impl From<Timeline> for RawTimeline {
    fn from(value: Timeline) -> Self {
        Self {
            periods: value.periods.into_iter().map(|(_, p)| p).collect(),
            timeseries: value.timeseries.into_iter().map(|(_, ts)| ts).collect(),
        }
    }
}
