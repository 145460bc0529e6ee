use fdr_engine::seeder::{SeedShape, seed_shapes};
use serde::Serialize;

/// One seed bid, as multiples of the base price
#[derive(Debug, Serialize)]
pub struct SeedDigest {
    pub bid: u64,
    #[serde(flatten)]
    pub shape: ShapeDigest,
    /// The multiple at each hour of the day
    pub hourly: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ShapeDigest {
    Flat { multiple: f64 },
    Diurnal { low: f64, high: f64, low_hour: u32 },
}

impl From<SeedShape> for ShapeDigest {
    fn from(shape: SeedShape) -> Self {
        match shape {
            SeedShape::Flat(multiple) => Self::Flat { multiple },
            SeedShape::Diurnal {
                low,
                high,
                low_hour,
            } => Self::Diurnal {
                low,
                high,
                low_hour,
            },
        }
    }
}

impl SeedDigest {
    pub fn list(flat_pricing: bool) -> Vec<Self> {
        seed_shapes(flat_pricing)
            .into_iter()
            .zip(1..)
            .map(|(shape, bid)| Self {
                bid,
                hourly: (0..24).map(|hour| shape.factor(hour, 1.0)).collect(),
                shape: shape.into(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_pricing_only_lists_flat_seeds() {
        let seeds = SeedDigest::list(true);
        assert_eq!(seeds.len(), 3);
        assert!(seeds.iter().all(|seed| matches!(seed.shape, ShapeDigest::Flat { .. })));
        assert_eq!(seeds[1].hourly, vec![1.0; 24]);
    }

    #[test]
    fn diurnal_seeds_bottom_out_at_their_low_hour() {
        let seeds = SeedDigest::list(false);
        assert_eq!(seeds.len(), 99);
        let seed = &seeds[3 + 5];
        assert!(matches!(
            seed.shape,
            ShapeDigest::Diurnal {
                low_hour: 5,
                ..
            }
        ));
        assert_eq!(seed.hourly[5], 0.01);
        assert!((seed.hourly[17] - 1.5).abs() < 1e-12);

        let json = serde_json::to_value(seed).unwrap();
        assert_eq!(json["kind"], "diurnal");
        assert_eq!(json["bid"], 9);
    }
}
