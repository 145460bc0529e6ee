use crate::{EngineError, PricingMode};
use argmin::{
    core::{CostFunction, Executor, State, TerminationReason},
    solver::brent::BrentRoot,
};
use fdr_core::{
    models::{
        Baseline, BidLedger, Map, Product, Profile, Snapshot, Timeline, TimepointId, Timeseries,
        TimeseriesId, ZoneId,
    },
    ports::{DemandModel, DispatchModel},
};
use std::cell::RefCell;
use tracing::{Level, event};

/// Prices for every (zone, timeseries), per product and timepoint
pub type Prices = Map<(ZoneId, TimeseriesId), Profile>;

/// Maximum number of step doublings when bracketing the flat price
const MAX_BRACKET_EXPANSIONS: usize = 40;

/// Maximum number of Brent iterations
const MAX_ROOT_ITERATIONS: u64 = 100;

/// Absolute tolerance on the flat price, in $/MWh
const ROOT_TOLERANCE: f64 = 1e-6;

/// Read the state of the latest dispatch solution.
///
/// Marginal costs are the balance duals divided by the timepoint's present-value
/// weight. The welfare cost of a timepoint is minus the weighted benefit of every bid,
/// summed over zones.
pub fn capture<M: DispatchModel>(
    model: &M,
    ledger: &BidLedger,
    timeline: &Timeline,
    zones: &[ZoneId],
) -> Result<Snapshot, EngineError> {
    let products = ledger.products();
    let capacity = zones.len() * timeline.timepoint_count() * products.len();
    let mut snapshot = Snapshot {
        marginal_cost: Map::with_capacity(capacity),
        demand: Map::with_capacity(capacity),
        welfare_cost: Map::with_capacity(timeline.timepoint_count()),
        system_cost: model.system_cost().map_err(EngineError::dispatch)?,
    };

    for zone in zones {
        for series in timeline.timeseries() {
            let weight = timeline.npv_weight(series);
            let mut benefit = 0.0;
            for bid in ledger.iter() {
                let w = model
                    .bid_weight(bid.id(), zone, &series.id)
                    .map_err(EngineError::dispatch)?;
                benefit += w * bid.benefit(zone, &series.id);
            }
            for timepoint in series.timepoints.iter() {
                snapshot.welfare_cost.accumulate(timepoint.clone(), -benefit);
                for &product in products {
                    let key = (zone.clone(), timepoint.clone(), product);
                    let dual = model
                        .dual_price(zone, timepoint, product)
                        .map_err(EngineError::dispatch)?;
                    let demand = model
                        .demand(zone, timepoint, product)
                        .map_err(EngineError::dispatch)?;
                    snapshot.marginal_cost.insert(key.clone(), dual / weight);
                    snapshot.demand.insert(key, demand);
                }
            }
        }
    }
    Ok(snapshot)
}

/// Turns the state of the last solve into the prices offered to the demand model.
#[derive(Debug, Clone, Copy)]
pub struct PriceOracle<'a> {
    timeline: &'a Timeline,
    zones: &'a [ZoneId],
    products: &'a [Product],
    baseline: &'a Baseline,
}

impl<'a> PriceOracle<'a> {
    /// An oracle over the given run
    pub fn new(
        timeline: &'a Timeline,
        zones: &'a [ZoneId],
        products: &'a [Product],
        baseline: &'a Baseline,
    ) -> Self {
        Self {
            timeline,
            zones,
            products,
            baseline,
        }
    }

    /// The marginal price of a product at a zone and timepoint.
    ///
    /// Before the first solve this is the baseline price for energy and zero for
    /// everything else.
    pub fn marginal_price(
        &self,
        previous: Option<&Snapshot>,
        zone: &ZoneId,
        timepoint: &TimepointId,
        product: Product,
    ) -> f64 {
        match previous {
            Some(snapshot) => snapshot.marginal_cost(zone, timepoint, product),
            None if product == Product::Energy => self
                .baseline
                .get(zone, timepoint)
                .map(|point| point.price)
                .unwrap_or_default(),
            None => 0.0,
        }
    }

    /// The marginal prices of every (zone, timeseries)
    pub fn marginal_costs(&self, previous: Option<&Snapshot>) -> Prices {
        let mut prices = Prices::with_capacity(self.zones.len() * self.timeline.timeseries().count());
        for zone in self.zones {
            for series in self.timeline.timeseries() {
                let profile = Profile::from_fn(self.products, series.len(), |product, i| {
                    self.marginal_price(previous, zone, &series.timepoints[i], product)
                });
                prices.insert((zone.clone(), series.id.clone()), profile);
            }
        }
        prices
    }

    /// The prices to offer to the demand model under `mode`.
    ///
    /// With flat pricing and `revenue_neutral`, the demand model is queried while
    /// searching for each break-even price.
    pub fn prices<D: DemandModel>(
        &self,
        mode: PricingMode,
        previous: Option<&Snapshot>,
        demand: &mut D,
        revenue_neutral: bool,
    ) -> Result<Prices, EngineError> {
        let marginal_costs = self.marginal_costs(previous);
        match mode {
            PricingMode::Dynamic => Ok(marginal_costs),
            PricingMode::Flat => {
                self.flat_prices(&marginal_costs, previous, demand, revenue_neutral)
            }
        }
    }

    /// Flat prices for every zone and period.
    ///
    /// Each is the price at which an intermediary buying at the dynamic marginal costs
    /// and reselling at the flat price would break even, given the demand model's
    /// response to the flat price. Without `revenue_neutral` the demand-weighted
    /// average marginal cost is used instead.
    pub fn flat_prices<D: DemandModel>(
        &self,
        marginal_costs: &Prices,
        previous: Option<&Snapshot>,
        demand: &mut D,
        revenue_neutral: bool,
    ) -> Result<Prices, EngineError> {
        let mut prices = Prices::with_capacity(marginal_costs.len());
        for zone in self.zones {
            for period in self.timeline.periods() {
                let series: Vec<&Timeseries> = self.timeline.series_in(&period.id).collect();
                let guess = self.average_cost(zone, &series, marginal_costs, previous);
                let price = if revenue_neutral {
                    let imbalance = RevenueImbalance {
                        demand: RefCell::new(&mut *demand),
                        zone,
                        series: &series,
                        products: self.products,
                        marginal_costs,
                    };
                    imbalance.solve(guess).map_err(|reason| EngineError::RootFinding {
                        zone: zone.clone(),
                        period: period.id.clone(),
                        reason,
                    })?
                } else {
                    guess
                };
                event!(Level::DEBUG, %zone, period = %period.id, guess, price, "flat price");

                for ts in series {
                    prices.insert((zone.clone(), ts.id.clone()), flat_profile(self.products, ts, price));
                }
            }
        }
        Ok(prices)
    }

    // Marginal cost weighted by demand and time, using the previous solve's demand or
    // the baseline load before any solve
    fn average_cost(
        &self,
        zone: &ZoneId,
        series: &[&Timeseries],
        marginal_costs: &Prices,
        previous: Option<&Snapshot>,
    ) -> f64 {
        let mut cost = 0.0;
        let mut quantity = 0.0;
        let mut plain = 0.0;
        let mut count = 0.0;
        for ts in series {
            let weight = ts.weight_in_year();
            for (i, timepoint) in ts.timepoints.iter().enumerate() {
                let mc = marginal_costs
                    .get(&(zone.clone(), ts.id.clone()))
                    .map(|profile| profile.value(Product::Energy, i))
                    .unwrap_or_default();
                let q = match previous {
                    Some(snapshot) => snapshot.demand(zone, timepoint, Product::Energy),
                    None => self
                        .baseline
                        .get(zone, timepoint)
                        .map(|point| point.load)
                        .unwrap_or_default(),
                };
                cost += mc * q * weight;
                quantity += q * weight;
                plain += mc * weight;
                count += weight;
            }
        }
        if quantity > 0.0 {
            cost / quantity
        } else if count > 0.0 {
            // without any demand, fall back to the time-weighted average
            plain / count
        } else {
            0.0
        }
    }
}

fn flat_profile(products: &[Product], series: &Timeseries, price: f64) -> Profile {
    Profile::from_fn(products, series.len(), |product, _| match product {
        Product::Energy => price,
        _ => 0.0,
    })
}

// The annual revenue of buying at the dynamic marginal costs minus the revenue of
// selling at a flat price, for one zone and period
struct RevenueImbalance<'a, D> {
    demand: RefCell<&'a mut D>,
    zone: &'a ZoneId,
    series: &'a [&'a Timeseries],
    products: &'a [Product],
    marginal_costs: &'a Prices,
}

impl<D: DemandModel> RevenueImbalance<'_, D> {
    fn imbalance(&self, price: f64) -> Result<f64, D::Error> {
        let mut demand = self.demand.borrow_mut();
        let mut dynamic = 0.0;
        let mut flat = 0.0;
        for ts in self.series {
            let response = demand.bid(self.zone, ts, &flat_profile(self.products, ts, price))?;
            let scale = ts.duration_hours * ts.scale_to_year;
            let costs = self.marginal_costs.get(&(self.zone.clone(), ts.id.clone()));
            for i in 0..ts.len() {
                let q = response.quantities.value(Product::Energy, i);
                let mc = costs
                    .map(|profile| profile.value(Product::Energy, i))
                    .unwrap_or_default();
                dynamic += mc * q * scale;
                flat += price * q * scale;
            }
        }
        let imbalance = dynamic - flat;
        event!(
            Level::TRACE,
            zone = %self.zone,
            price,
            imbalance,
            "revenue imbalance"
        );
        Ok(imbalance)
    }

    fn evaluate(&self, price: f64) -> Result<f64, String> {
        self.imbalance(price).map_err(|e| e.to_string())
    }

    // Expand a bracket around the guess until the imbalance changes sign, then
    // refine it with Brent's method
    fn solve(self, guess: f64) -> Result<f64, String> {
        let at_guess = self.evaluate(guess)?;
        if at_guess == 0.0 {
            return Ok(guess);
        }

        let mut step = (0.1 * guess.abs()).max(1.0);
        let mut bracket = None;
        for _ in 0..MAX_BRACKET_EXPANSIONS {
            let (low, high) = (guess - step, guess + step);
            let (f_low, f_high) = (self.evaluate(low)?, self.evaluate(high)?);
            if f_low == 0.0 {
                return Ok(low);
            }
            if f_high == 0.0 {
                return Ok(high);
            }
            if f_low.signum() != at_guess.signum() {
                bracket = Some((low, guess));
                break;
            }
            if f_high.signum() != at_guess.signum() {
                bracket = Some((guess, high));
                break;
            }
            step *= 2.0;
        }
        let (low, high) = bracket.ok_or_else(|| {
            format!("no sign change of the revenue imbalance near {guess}")
        })?;

        let solver = BrentRoot::new(low, high, ROOT_TOLERANCE);
        let result = Executor::new(self, solver)
            .configure(|state| state.max_iters(MAX_ROOT_ITERATIONS))
            .run()
            .map_err(|e| e.to_string())?;
        let state = result.state();
        if state.get_termination_reason() != Some(&TerminationReason::SolverConverged) {
            return Err(format!(
                "root finding stopped after {} iterations without converging",
                state.get_iter()
            ));
        }
        // the last iterate is the root
        state
            .get_param()
            .copied()
            .ok_or_else(|| "root finding produced no price".to_owned())
    }
}

impl<D: DemandModel> CostFunction for RevenueImbalance<'_, D> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, price: &f64) -> Result<f64, argmin::core::Error> {
        self.imbalance(*price).map_err(argmin::core::Error::from)
    }
}
