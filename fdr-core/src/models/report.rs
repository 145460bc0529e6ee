use crate::models::{BidId, Map, PeriodId, Product, TimepointId, ZoneId};

/// The cost and trade summary written after every dispatch solve.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSummary {
    /// The run tag
    pub tag: String,
    /// The id of the most recent bid
    pub bid: BidId,
    /// The dispatch model's objective value (present value)
    pub total_cost: f64,
    /// Annual direct costs (every registered component except welfare), per period
    pub direct_cost_per_year: Map<PeriodId>,
    /// Annual welfare cost of the flexible demand, per period
    pub welfare_cost_per_year: Map<PeriodId>,
    /// Annual payments by the flexible demand at marginal cost, per product and period
    pub payment_per_year: Map<(Product, PeriodId)>,
    /// Annual quantity bought by the flexible demand, per product and period
    pub sold_per_year: Map<(Product, PeriodId)>,
}

/// One product's values in a row of the energy balance table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProductBalance {
    /// The price offered to the demand model for the last bid
    pub offered_price: f64,
    /// The quantity of the last bid
    pub bid_quantity: f64,
    /// The final marginal cost
    pub final_marginal_cost: f64,
    /// The final price charged to the flexible demand
    pub final_price: f64,
    /// The final flexible demand
    pub final_quantity: f64,
}

/// One (zone, timepoint) row of the final energy balance table.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyBalanceRow {
    /// The zone
    pub zone: ZoneId,
    /// The period
    pub period: PeriodId,
    /// The timepoint
    pub timepoint: TimepointId,
    /// Whether the timepoint belongs to a rarely occurring (peak) timeseries
    pub peak_day: bool,
    /// The per-product values
    pub products: Map<Product, ProductBalance>,
    /// The baseline load
    pub base_load: f64,
    /// The baseline price
    pub base_price: f64,
}

/// How a constraint relates its left-hand side to its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `lhs == bound`
    Equal,
    /// `lhs <= bound`
    AtMost,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Relation::Equal => "==",
            Relation::AtMost => "<=",
        })
    }
}

/// The cost a constraint of the dispatch model attributes to its bound.
///
/// For a linear objective the total costs of all constraints sum to the objective
/// value, so the table shows which limits the system cost comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct DualCost {
    /// The constraint's name
    pub constraint: String,
    /// Equality or upper bound
    pub direction: Relation,
    /// The right-hand side
    pub bound: f64,
    /// The dual value (present value)
    pub dual: f64,
    /// The cost attributed to the bound, `-dual * bound`
    pub total_cost: f64,
}
