//! The flexible demand enters the dispatch model as a convex combination of bids,
//! so the cost of the current solution is an upper bound on the cost of the best
//! solution any future bid could reach. A lower bound comes from pricing the
//! demand model's newest bid at the previous marginal costs: if the demand model
//! maximizes its benefit net of those costs, no combination of bids can do better.

use fdr_core::models::{Bid, Product, Snapshot, Timeline, ZoneId};

/// Below this, relative to the baseline expenditure, a violated bound is numerical noise
pub const BOUND_NOISE: f64 = 1e-6;

/// A cost split into what is paid for energy and reserves and what the demand
/// side gives up, both in present value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostParts {
    /// Purchases valued at the marginal costs
    pub direct: f64,
    /// Minus the benefit
    pub welfare: f64,
}

impl CostParts {
    /// The sum of both parts
    pub fn total(&self) -> f64 {
        self.direct + self.welfare
    }
}

/// The cost of the previous solution: its flexible demand bought at its marginal
/// costs, plus its welfare cost.
pub fn previous_cost(
    snapshot: &Snapshot,
    timeline: &Timeline,
    zones: &[ZoneId],
    products: &[Product],
) -> CostParts {
    let mut cost = CostParts::default();
    for (series, _, timepoint) in timeline.timepoints() {
        let weight = timeline.npv_weight(series);
        let mut direct = 0.0;
        for zone in zones {
            for &product in products {
                direct += snapshot.marginal_cost(zone, timepoint, product)
                    * snapshot.demand(zone, timepoint, product);
            }
        }
        cost.direct += direct * weight;
        cost.welfare += snapshot.welfare_cost.value_or_zero(timepoint) * weight;
    }
    cost
}

/// The cost of serving `bid` alone at the previous marginal costs, net of its benefit
pub fn lower_bound(
    snapshot: &Snapshot,
    bid: &Bid,
    timeline: &Timeline,
    zones: &[ZoneId],
    products: &[Product],
) -> CostParts {
    let mut cost = CostParts::default();
    for zone in zones {
        for series in timeline.timeseries() {
            let weight = timeline.npv_weight(series);
            for (i, timepoint) in series.timepoints.iter().enumerate() {
                let mut direct = 0.0;
                for &product in products {
                    direct += snapshot.marginal_cost(zone, timepoint, product)
                        * bid.quantity(zone, &series.id, product, i);
                }
                cost.direct += direct * weight;
            }
            cost.welfare -= bid.benefit(zone, &series.id) * weight * series.len() as f64;
        }
    }
    cost
}

/// The distance between the current cost and its lower bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gap {
    /// The cost of the previous solution
    pub previous_cost: f64,
    /// The lower bound from the newest bid
    pub best_cost: f64,
    /// The normalization
    pub baseline_expenditure: f64,
}

impl Gap {
    /// The gap relative to the baseline expenditure
    pub fn relative(&self) -> f64 {
        (self.previous_cost - self.best_cost) / self.baseline_expenditure
    }

    /// Whether the gap is within `tolerance`. A baseline without expenditure
    /// gives no scale to measure against, so such a gap never converges.
    pub fn converged(&self, tolerance: f64) -> bool {
        let relative = self.relative();
        self.baseline_expenditure > 0.0 && relative.is_finite() && relative <= tolerance
    }

    /// Whether the lower bound exceeds the current cost beyond numerical noise,
    /// which means the demand model is not concave in its benefit
    pub fn violates_bound(&self) -> bool {
        self.previous_cost < self.best_cost - BOUND_NOISE * self.baseline_expenditure.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case(100.0, 100.0, true)]
    #[case(100.0, 95.0, false)]
    #[case(100.0, 99.5, true)]
    #[case(100.0, 120.0, true)]
    fn gap_is_relative_to_expenditure(
        #[case] previous_cost: f64,
        #[case] best_cost: f64,
        #[case] converged: bool,
    ) {
        let gap = Gap {
            previous_cost,
            best_cost,
            baseline_expenditure: 100.0,
        };
        assert_eq!(gap.converged(0.01), converged);
    }

    #[rstest]
    #[case(1.0, 2.0)]
    #[case(2.0, 1.0)]
    #[case(1.0, 1.0)]
    fn no_expenditure_never_converges(#[case] previous_cost: f64, #[case] best_cost: f64) {
        let gap = Gap {
            previous_cost,
            best_cost,
            baseline_expenditure: 0.0,
        };
        assert!(!gap.converged(0.01));
    }

    #[test]
    fn small_violations_are_noise() {
        let gap = |best_cost| Gap {
            previous_cost: 1000.0,
            best_cost,
            baseline_expenditure: 1e6,
        };
        assert!(!gap(1000.5).violates_bound());
        assert!(gap(1002.0).violates_bound());
        assert!(!gap(900.0).violates_bound());
    }
}
