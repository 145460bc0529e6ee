use crate::models::{Map, Product, TimepointId, ZoneId};

/// What the coordination loop remembers about the most recent dispatch solve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Marginal cost per unit, i.e. the balance dual divided by the timepoint's present-value weight
    pub marginal_cost: Map<(ZoneId, TimepointId, Product)>,
    /// Flexible demand chosen by the dispatch model (convex combination of bid quantities)
    pub demand: Map<(ZoneId, TimepointId, Product)>,
    /// Welfare cost per timepoint, summed over zones: minus the weighted benefit of the bids
    pub welfare_cost: Map<TimepointId>,
    /// The dispatch model's objective value
    pub system_cost: f64,
}

impl Snapshot {
    /// The marginal cost of a product at a zone and timepoint
    pub fn marginal_cost(&self, zone: &ZoneId, timepoint: &TimepointId, product: Product) -> f64 {
        self.marginal_cost
            .value_or_zero(&(zone.clone(), timepoint.clone(), product))
    }

    /// The flexible demand of a product at a zone and timepoint
    pub fn demand(&self, zone: &ZoneId, timepoint: &TimepointId, product: Product) -> f64 {
        self.demand.value_or_zero(&(zone.clone(), timepoint.clone(), product))
    }
}

/// The per-run iteration state owned by the controller.
///
/// At iteration 0 there is no previous solve; every later iteration overwrites the
/// snapshot with the solve that just completed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationState {
    /// The 0-based iteration number
    pub iteration: usize,
    /// The most recent solve, absent before the first solve
    pub previous: Option<Snapshot>,
}
