//! Seed bids give the dispatch model a spread of demand profiles before the
//! first real iteration: three flat price levels and, unless flat pricing is
//! active, 96 diurnal price curves peaking at every hour of the day.

use crate::oracle::Prices;
use fdr_core::models::{Baseline, Product, Profile, Timeline, ZoneId};

/// Multiples of the base price used for the flat seeds
pub const FLAT_MULTIPLIERS: [f64; 3] = [0.5, 1.0, 2.0];

/// Troughs of the diurnal seeds, as multiples of the base price
pub const DIURNAL_LOWS: [f64; 2] = [0.01, 0.5];

/// Peaks of the diurnal seeds, as multiples of the base price
pub const DIURNAL_HIGHS: [f64; 2] = [1.5, 3.0];

/// Reserve products are priced at this fraction of the energy base price
pub const RESERVE_PRICE_SHARE: f64 = 0.01;

/// The shape of one seed price path, relative to the base price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeedShape {
    /// The same multiple at every timepoint
    Flat(f64),
    /// `low` at `low_hour`, rising linearly to `high` twelve hours later and back
    Diurnal {
        /// The trough multiple
        low: f64,
        /// The peak multiple
        high: f64,
        /// The hour of the trough
        low_hour: u32,
    },
}

impl SeedShape {
    /// The multiple of the base price at timepoint `i` of a series with timepoints of `duration` hours
    pub fn factor(&self, i: usize, duration: f64) -> f64 {
        match *self {
            Self::Flat(multiple) => multiple,
            Self::Diurnal {
                low,
                high,
                low_hour,
            } => interpolate(i, duration, f64::from(low_hour), low, high),
        }
    }
}

/// Interpolate between `low` at `low_hour` and `high` twelve hours later.
///
/// Timepoints are anchored at their start, so timepoint 0 is exactly `low` when
/// `low_hour` is 0, whatever the duration.
pub fn interpolate(i: usize, duration: f64, low_hour: f64, low: f64, high: f64) -> f64 {
    let moment = (i as f64 * duration - low_hour).rem_euclid(24.0);
    let mut frac = moment / 12.0;
    if frac > 1.0 {
        frac = 2.0 - frac;
    }
    (1.0 - frac) * low + frac * high
}

/// Every seed shape, in the order the seeds are created
pub fn seed_shapes(flat_pricing: bool) -> Vec<SeedShape> {
    let mut shapes: Vec<SeedShape> = FLAT_MULTIPLIERS.iter().map(|&m| SeedShape::Flat(m)).collect();
    if !flat_pricing {
        for &low in DIURNAL_LOWS.iter() {
            for &high in DIURNAL_HIGHS.iter() {
                for low_hour in 0..24 {
                    shapes.push(SeedShape::Diurnal {
                        low,
                        high,
                        low_hour,
                    });
                }
            }
        }
    }
    shapes
}

/// The number of seed bids
pub fn seed_count(flat_pricing: bool) -> usize {
    FLAT_MULTIPLIERS.len()
        + if flat_pricing {
            0
        } else {
            DIURNAL_LOWS.len() * DIURNAL_HIGHS.len() * 24
        }
}

/// The prices of one seed for every zone and timeseries.
///
/// The base price of a (zone, timeseries) is its average baseline price; reserve
/// products use [`RESERVE_PRICE_SHARE`] of it.
pub fn seed_prices(
    shape: &SeedShape,
    timeline: &Timeline,
    zones: &[ZoneId],
    products: &[Product],
    baseline: &Baseline,
) -> Prices {
    let mut prices = Prices::with_capacity(zones.len() * timeline.timeseries().count());
    for zone in zones {
        for series in timeline.timeseries() {
            let energy = baseline.average_price(zone, series);
            let profile = Profile::from_fn(products, series.len(), |product, i| {
                let base = if product.is_reserve() {
                    RESERVE_PRICE_SHARE * energy
                } else {
                    energy
                };
                shape.factor(i, series.duration_hours) * base
            });
            prices.insert((zone.clone(), series.id.clone()), profile);
        }
    }
    prices
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;

    #[rstest]
    #[case(0.5)]
    #[case(1.0)]
    #[case(4.0)]
    fn first_timepoint_starts_low(#[case] duration: f64) {
        assert_eq!(interpolate(0, duration, 0.0, 0.01, 3.0), 0.01);
    }

    #[rstest]
    #[case(12, 0.0, 3.0)]
    #[case(6, 0.0, 1.5)]
    #[case(18, 0.0, 1.5)]
    #[case(0, 6.0, 1.5)]
    #[case(23, 23.0, 0.0)]
    fn curve_mirrors_at_twelve_hours(#[case] i: usize, #[case] low_hour: f64, #[case] expected: f64) {
        assert_relative_eq!(interpolate(i, 1.0, low_hour, 0.0, 3.0), expected);
    }

    #[test]
    fn seeds_are_enumerated_in_a_fixed_order() {
        let shapes = seed_shapes(false);
        assert_eq!(shapes.len(), seed_count(false));
        assert_eq!(shapes.len(), 99);
        assert_eq!(shapes[0], SeedShape::Flat(0.5));
        assert_eq!(shapes[2], SeedShape::Flat(2.0));
        assert_eq!(
            shapes[3],
            SeedShape::Diurnal {
                low: 0.01,
                high: 1.5,
                low_hour: 0
            }
        );
        assert_eq!(
            shapes[3 + 24],
            SeedShape::Diurnal {
                low: 0.01,
                high: 3.0,
                low_hour: 0
            }
        );
        assert_eq!(
            shapes[98],
            SeedShape::Diurnal {
                low: 0.5,
                high: 3.0,
                low_hour: 23
            }
        );
        assert_eq!(seed_shapes(false), shapes);

        assert_eq!(seed_shapes(true).len(), 3);
        assert_eq!(seed_count(true), 3);
    }
}
