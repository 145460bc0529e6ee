use crate::models::{Bid, BidId, CostScope, DualCost, PeriodId, Product, TimepointId, TimeseriesId, ZoneId};

/// Interface to the supply-side optimization model.
///
/// The dispatch model chooses, for every weight scope, an optimal convex combination
/// of the registered bids, alongside its own supply decisions. The coordination loop
/// only ever interacts with it through this trait: it registers components and bids,
/// asks for a rebuild and a re-solve, and reads back duals, demand and weights.
///
/// Registration and solving are strictly ordered: after [`register_bid`](Self::register_bid)
/// the model is stale until [`rebuild`](Self::rebuild) succeeds, and
/// [`resolve`](Self::resolve) on a stale model is an error.
pub trait DispatchModel {
    /// Error type for model failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Register a named cost component that will appear in the objective
    fn register_cost_component(&mut self, name: &str, scope: CostScope) -> Result<(), Self::Error>;

    /// Register a named provision towards a reserve product
    fn register_reserve_provision(&mut self, product: Product, name: &str) -> Result<(), Self::Error>;

    /// Add a bid as a new set of weight columns. Registering an id twice is an error.
    fn register_bid(&mut self, bid: &Bid) -> Result<(), Self::Error>;

    /// Re-derive every component that depends on the registered bids
    fn rebuild(&mut self) -> Result<(), Self::Error>;

    /// Solve the model. The returned future completes once the solution is available.
    fn resolve(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Whether the latest solve produced usable duals
    fn has_duals(&self) -> bool;

    /// The raw (present-value) dual of the balance constraint of `product` at a zone and timepoint
    fn dual_price(
        &self,
        zone: &ZoneId,
        timepoint: &TimepointId,
        product: Product,
    ) -> Result<f64, Self::Error>;

    /// The flexible demand of `product` at a zone and timepoint in the latest solution
    fn demand(
        &self,
        zone: &ZoneId,
        timepoint: &TimepointId,
        product: Product,
    ) -> Result<f64, Self::Error>;

    /// The weight the latest solution places on a bid for a zone and timeseries
    fn bid_weight(
        &self,
        bid: BidId,
        zone: &ZoneId,
        timeseries: &TimeseriesId,
    ) -> Result<f64, Self::Error>;

    /// The objective value of the latest solution
    fn system_cost(&self) -> Result<f64, Self::Error>;

    /// The names of every registered cost component, in registration order
    fn cost_components(&self) -> Vec<String>;

    /// The annual (undiscounted) value of a registered cost component in a period
    fn cost_component(&self, name: &str, period: &PeriodId) -> Result<f64, Self::Error>;

    /// The cost each constraint of the latest solution attributes to its bound,
    /// omitting constraints that attribute none. Models without named constraints
    /// report nothing.
    fn dual_costs(&self) -> Result<Vec<DualCost>, Self::Error> {
        Ok(Vec::new())
    }
}
