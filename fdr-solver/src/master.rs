use crate::{
    Backend, BackendError, Component, DependencyGraph, DispatchSystem, Program, ProgramSolution,
    Row, Sense, SystemError,
};
use fdr_core::{
    models::{
        Bid, BidId, ComponentRegistry, CostScope, DEMAND_RESPONSE_PROVISION, DEMAND_WELFARE,
        DualCost, Map, PeriodId, Product, RegistryError, Relation, Timeline, TimepointId,
        TimeseriesId, WeightPolicy, WeightScope, ZoneId,
    },
    ports::DispatchModel,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Level, event};

/// The cost component of generator output
pub const GENERATION: &str = "generation";
/// The cost component of unserved energy
pub const UNSERVED_ENERGY: &str = "unserved_energy";
/// The reserve provision made by generator headroom
pub const GENERATOR_HEADROOM: &str = "generator_headroom";

/// The ways the reference dispatch model can fail.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A bid was registered since the last rebuild
    #[error("the dispatch model must be rebuilt before it is solved")]
    Stale,
    /// No solution is available
    #[error("the dispatch model has not been solved since the last change")]
    NoSolution,
    /// A bid id was registered twice
    #[error("bid {0} is already registered")]
    DuplicateBid(BidId),
    /// A bid id is not registered
    #[error("bid {0} is not registered")]
    UnknownBid(BidId),
    /// A zone is not part of the system
    #[error("zone {0} is not part of the system")]
    UnknownZone(ZoneId),
    /// A timeseries is not part of the timeline
    #[error("timeseries {0} is not part of the timeline")]
    UnknownTimeseries(TimeseriesId),
    /// A (zone, timepoint) has no balance row
    #[error("no energy balance for zone {zone} at timepoint {timepoint}")]
    UnknownTimepoint {
        /// The zone
        zone: ZoneId,
        /// The timepoint
        timepoint: TimepointId,
    },
    /// A cost component was used without being registered
    #[error("cost component `{0}` is not registered")]
    UnregisteredComponent(String),
    /// A provision was registered for a reserve product the system does not require
    #[error("the system has no requirement for {0}")]
    NoReserveRequirement(Product),
    /// Registration failed
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The system description is invalid
    #[error(transparent)]
    System(#[from] SystemError),
    /// The QP backend failed
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The blocking solve task was cancelled or panicked
    #[error("solver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// The coefficients one bid contributes within one weight scope
#[derive(Debug, Clone, Default)]
struct ScopeColumn {
    period: Option<PeriodId>,
    // benefit times the present-value weight of every covered timepoint
    benefit: f64,
    // (zone, timepoint, product) -> quantity
    quantities: Vec<((ZoneId, TimepointId, Product), f64)>,
}

#[derive(Debug, Clone)]
struct RegisteredBid {
    id: BidId,
    scopes: Map<WeightScope, ScopeColumn>,
}

// A contribution to a named cost component, in present value
#[derive(Debug, Clone)]
struct CostTerm {
    component: &'static str,
    period: PeriodId,
    column: usize,
    linear: f64,
    quadratic: f64,
}

#[derive(Debug, Clone, Default)]
struct SupplyBlock {
    p: Vec<f64>,
    q: Vec<f64>,
    // named bounds on the supply columns
    bounds: Vec<(String, Row)>,
    energy: Map<(ZoneId, TimepointId), Vec<(usize, f64)>>,
    reserve: Map<(Product, TimepointId), Vec<(usize, f64)>>,
    costs: Vec<CostTerm>,
}

impl SupplyBlock {
    fn column(&mut self, p: f64, q: f64) -> usize {
        self.p.push(p);
        self.q.push(q);
        self.q.len() - 1
    }
}

#[derive(Debug, Clone, Default)]
struct Cache {
    supply: SupplyBlock,
    // (bid, scope) -> column
    weights: Map<(BidId, WeightScope), usize>,
    convex: Vec<(String, Row)>,
    flexible_demand: Map<(ZoneId, TimepointId, Product), Vec<(usize, f64)>>,
    reserve_sales: Map<(Product, TimepointId), Vec<(usize, f64)>>,
    welfare: Vec<CostTerm>,
    energy_rows: Map<(ZoneId, TimepointId), Row>,
    reserve_rows: Map<(Product, TimepointId), Row>,
    p: Vec<f64>,
    q: Vec<f64>,
}

#[derive(Debug)]
struct Assembled {
    program: Arc<Program>,
    // one name per row of the program
    labels: Vec<String>,
    energy_rows: Map<(ZoneId, TimepointId), usize>,
    reserve_rows: Map<(Product, TimepointId), usize>,
}

/// The reference dispatch model.
///
/// Supply columns are built once. Each registered bid adds one non-negative weight column
/// per weight scope, entering the energy balance with its energy quantities, the reserve
/// requirements with its reserve quantities, and the objective with minus its benefit.
/// One convexity row per scope forces the weights to sum to one.
#[derive(Debug)]
pub struct MasterProblem<B> {
    backend: B,
    timeline: Timeline,
    system: DispatchSystem,
    policy: WeightPolicy,
    registry: ComponentRegistry,
    graph: DependencyGraph,
    bids: Vec<RegisteredBid>,
    cache: Cache,
    assembled: Option<Assembled>,
    solution: Option<ProgramSolution>,
}

impl<B: Backend> MasterProblem<B> {
    /// Create a model of `system` over `timeline`, sharing bid weights according to `policy`
    pub fn new(
        backend: B,
        timeline: Timeline,
        system: DispatchSystem,
        policy: WeightPolicy,
    ) -> Result<Self, ModelError> {
        system.validate(&timeline)?;

        let mut registry = ComponentRegistry::default();
        registry.register_cost_component(GENERATION, CostScope::PerTimepoint)?;
        registry.register_cost_component(UNSERVED_ENERGY, CostScope::PerTimepoint)?;
        for product in system.reserve_products() {
            registry.register_reserve_provision(product, GENERATOR_HEADROOM)?;
        }

        Ok(Self {
            backend,
            timeline,
            system,
            policy,
            registry,
            graph: DependencyGraph::default(),
            bids: Vec::new(),
            cache: Cache::default(),
            assembled: None,
            solution: None,
        })
    }

    /// The timeline the model is defined over
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The physical system
    pub fn system(&self) -> &DispatchSystem {
        &self.system
    }

    /// The registered components
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// The most recently assembled program, if the model is up to date
    pub fn program(&self) -> Option<&Program> {
        if self.graph.is_stale() {
            None
        } else {
            self.assembled.as_ref().map(|a| a.program.as_ref())
        }
    }

    fn solved(&self) -> Result<&ProgramSolution, ModelError> {
        self.solution.as_ref().ok_or(ModelError::NoSolution)
    }

    fn build(&mut self, component: Component) {
        match component {
            Component::Supply => self.cache.supply = self.build_supply(),
            Component::BidWeights => {
                let offset = self.cache.supply.q.len();
                self.cache.weights = self
                    .bids
                    .iter()
                    .flat_map(|bid| bid.scopes.keys().map(move |scope| (bid.id, scope.clone())))
                    .enumerate()
                    .map(|(i, key)| (key, offset + i))
                    .collect();
            }
            Component::ConvexRows => {
                let mut by_scope: Map<WeightScope, Vec<(usize, f64)>> = Map::default();
                let mut rows = Vec::new();
                for ((bid, scope), &column) in self.cache.weights.iter() {
                    by_scope.entry(scope.clone()).or_default().push((column, 1.0));
                    rows.push((
                        format!("min_weight[{bid},{scope}]"),
                        Row::at_most(vec![(column, -1.0)], 0.0),
                    ));
                }
                rows.extend(by_scope.into_iter().map(|(scope, terms)| {
                    (format!("convexity[{scope}]"), Row::equal(terms, 1.0))
                }));
                self.cache.convex = rows;
            }
            Component::FlexibleDemand => {
                let mut expression: Map<(ZoneId, TimepointId, Product), Vec<(usize, f64)>> =
                    Map::default();
                for bid in self.bids.iter() {
                    for (scope, column) in bid.scopes.iter() {
                        let index = self.cache.weights[&(bid.id, scope.clone())];
                        for (key, quantity) in column.quantities.iter() {
                            expression.entry(key.clone()).or_default().push((index, *quantity));
                        }
                    }
                }
                self.cache.flexible_demand = expression;
            }
            Component::ReserveSales => {
                let mut sales: Map<(Product, TimepointId), Vec<(usize, f64)>> = Map::default();
                for bid in self.bids.iter() {
                    for (scope, column) in bid.scopes.iter() {
                        let index = self.cache.weights[&(bid.id, scope.clone())];
                        for ((_, timepoint, product), quantity) in column.quantities.iter() {
                            if product.is_reserve()
                                && self.registry.provides(*product, DEMAND_RESPONSE_PROVISION)
                            {
                                sales
                                    .entry((*product, timepoint.clone()))
                                    .or_default()
                                    .push((index, *quantity));
                            }
                        }
                    }
                }
                self.cache.reserve_sales = sales;
            }
            Component::Welfare => {
                let mut terms = Vec::new();
                for bid in self.bids.iter() {
                    for (scope, column) in bid.scopes.iter() {
                        let index = self.cache.weights[&(bid.id, scope.clone())];
                        if let Some(period) = column.period.clone() {
                            terms.push(CostTerm {
                                component: DEMAND_WELFARE,
                                period,
                                column: index,
                                linear: -column.benefit,
                                quadratic: 0.0,
                            });
                        }
                    }
                }
                self.cache.welfare = terms;
            }
            Component::EnergyBalance => {
                // Σ λ q − Σ g − u − inflow + outflow = −fixed load
                let mut rows = Map::default();
                for (_, _, timepoint) in self.timeline.timepoints() {
                    for zone in self.system.zones.iter() {
                        let key = (zone.clone(), timepoint.clone());
                        let mut terms = self
                            .cache
                            .flexible_demand
                            .get(&(zone.clone(), timepoint.clone(), Product::Energy))
                            .cloned()
                            .unwrap_or_default();
                        if let Some(supply) = self.cache.supply.energy.get(&key) {
                            terms.extend_from_slice(supply);
                        }
                        let rhs = -self.system.fixed_load(zone, timepoint);
                        rows.insert(key, Row::equal(terms, rhs));
                    }
                }
                self.cache.energy_rows = rows;
            }
            Component::ReserveBalance => {
                // −Σ r + Σ λ q ≤ −requirement
                let mut rows = Map::default();
                for (_, _, timepoint) in self.timeline.timepoints() {
                    for product in self.system.reserve_products() {
                        let key = (product, timepoint.clone());
                        let mut terms = self
                            .cache
                            .supply
                            .reserve
                            .get(&key)
                            .cloned()
                            .unwrap_or_default();
                        if let Some(sales) = self.cache.reserve_sales.get(&key) {
                            terms.extend_from_slice(sales);
                        }
                        let rhs = -self.system.requirement(product, timepoint);
                        rows.insert(key, Row::at_most(terms, rhs));
                    }
                }
                self.cache.reserve_rows = rows;
            }
            Component::Objective => {
                let mut p = self.cache.supply.p.clone();
                let mut q = self.cache.supply.q.clone();
                p.resize(p.len() + self.cache.weights.len(), 0.0);
                q.resize(q.len() + self.cache.weights.len(), 0.0);
                for term in self.cache.welfare.iter() {
                    q[term.column] += term.linear;
                }
                self.cache.p = p;
                self.cache.q = q;
            }
        }
    }

    fn build_supply(&self) -> SupplyBlock {
        let mut block = SupplyBlock::default();

        for (series, _, timepoint) in self.timeline.timepoints() {
            let weight = self.timeline.npv_weight(series);
            let period = series.period.clone();

            for generator in self.system.generators.iter() {
                let available = generator.available(timepoint);
                let g = block.column(
                    weight * generator.quadratic_cost,
                    weight * generator.marginal_cost,
                );
                block.costs.push(CostTerm {
                    component: GENERATION,
                    period: period.clone(),
                    column: g,
                    linear: weight * generator.marginal_cost,
                    quadratic: weight * generator.quadratic_cost,
                });
                block
                    .energy
                    .entry((generator.zone.clone(), timepoint.clone()))
                    .or_default()
                    .push((g, -1.0));
                block.bounds.push((
                    format!("min_output[{},{timepoint}]", generator.name),
                    Row::at_most(vec![(g, -1.0)], 0.0),
                ));

                // g + r_up ≤ available, r_dn ≤ g
                let mut headroom = vec![(g, 1.0)];
                if generator.reserve_capable {
                    for product in self.system.reserve_products() {
                        if !self.registry.provides(product, GENERATOR_HEADROOM) {
                            continue;
                        }
                        let r = block.column(0.0, 0.0);
                        block.bounds.push((
                            format!("min_reserve[{},{product},{timepoint}]", generator.name),
                            Row::at_most(vec![(r, -1.0)], 0.0),
                        ));
                        block
                            .reserve
                            .entry((product, timepoint.clone()))
                            .or_default()
                            .push((r, -1.0));
                        match product {
                            Product::ReserveUp => headroom.push((r, 1.0)),
                            _ => block.bounds.push((
                                format!("reserve_within_output[{},{product},{timepoint}]", generator.name),
                                Row::at_most(vec![(r, 1.0), (g, -1.0)], 0.0),
                            )),
                        }
                    }
                }
                block.bounds.push((
                    format!("max_output[{},{timepoint}]", generator.name),
                    Row::at_most(headroom, available),
                ));
            }

            for line in self.system.lines.iter() {
                let f = block.column(0.0, 0.0);
                block.bounds.push((
                    format!("max_flow[{},{timepoint}]", line.name),
                    Row::at_most(vec![(f, 1.0)], line.capacity),
                ));
                block.bounds.push((
                    format!("max_reverse_flow[{},{timepoint}]", line.name),
                    Row::at_most(vec![(f, -1.0)], line.capacity),
                ));
                block
                    .energy
                    .entry((line.from.clone(), timepoint.clone()))
                    .or_default()
                    .push((f, 1.0));
                block
                    .energy
                    .entry((line.to.clone(), timepoint.clone()))
                    .or_default()
                    .push((f, -1.0));
            }

            for zone in self.system.zones.iter() {
                let penalty = weight * self.system.unserved_energy_penalty;
                let u = block.column(0.0, penalty);
                block.costs.push(CostTerm {
                    component: UNSERVED_ENERGY,
                    period: period.clone(),
                    column: u,
                    linear: penalty,
                    quadratic: 0.0,
                });
                block.bounds.push((
                    format!("min_unserved[{zone},{timepoint}]"),
                    Row::at_most(vec![(u, -1.0)], 0.0),
                ));
                block
                    .energy
                    .entry((zone.clone(), timepoint.clone()))
                    .or_default()
                    .push((u, -1.0));
            }
        }

        block
    }

    fn assemble(&self) -> Assembled {
        let mut rows = Vec::with_capacity(
            self.cache.energy_rows.len()
                + self.cache.convex.len()
                + self.cache.supply.bounds.len()
                + self.cache.reserve_rows.len(),
        );

        let mut labels = Vec::with_capacity(rows.capacity());

        let mut energy_rows = Map::with_capacity(self.cache.energy_rows.len());
        for ((zone, timepoint), row) in self.cache.energy_rows.iter() {
            energy_rows.insert((zone.clone(), timepoint.clone()), rows.len());
            labels.push(format!("energy_balance[{zone},{timepoint}]"));
            rows.push(row.clone());
        }
        for (label, row) in self.cache.convex.iter().chain(self.cache.supply.bounds.iter()) {
            labels.push(label.clone());
            rows.push(row.clone());
        }
        let mut reserve_rows = Map::with_capacity(self.cache.reserve_rows.len());
        for ((product, timepoint), row) in self.cache.reserve_rows.iter() {
            reserve_rows.insert((*product, timepoint.clone()), rows.len());
            labels.push(format!("reserve_balance[{product},{timepoint}]"));
            rows.push(row.clone());
        }

        Assembled {
            program: Arc::new(Program {
                p_diag: self.cache.p.clone(),
                q: self.cache.q.clone(),
                rows,
            }),
            labels,
            energy_rows,
            reserve_rows,
        }
    }

    fn timepoint_of(&self, zone: &ZoneId, timepoint: &TimepointId) -> Result<(), ModelError> {
        if self.system.zones.contains(zone) && self.timeline.locate(timepoint).is_some() {
            Ok(())
        } else {
            Err(ModelError::UnknownTimepoint {
                zone: zone.clone(),
                timepoint: timepoint.clone(),
            })
        }
    }
}

impl<B: Backend> DispatchModel for MasterProblem<B> {
    type Error = ModelError;

    fn register_cost_component(&mut self, name: &str, scope: CostScope) -> Result<(), Self::Error> {
        self.registry.register_cost_component(name, scope)?;
        self.graph.invalidate(Component::Welfare);
        Ok(())
    }

    fn register_reserve_provision(&mut self, product: Product, name: &str) -> Result<(), Self::Error> {
        if !self.system.reserve_products().contains(&product) {
            return Err(ModelError::NoReserveRequirement(product));
        }
        self.registry.register_reserve_provision(product, name)?;
        self.graph.invalidate(Component::Supply);
        self.graph.invalidate(Component::ReserveSales);
        Ok(())
    }

    fn register_bid(&mut self, bid: &Bid) -> Result<(), Self::Error> {
        if self.bids.iter().any(|registered| registered.id == bid.id()) {
            return Err(ModelError::DuplicateBid(bid.id()));
        }
        if !self.registry.has_cost(DEMAND_WELFARE) {
            return Err(ModelError::UnregisteredComponent(DEMAND_WELFARE.to_owned()));
        }

        let mut scopes: Map<WeightScope, ScopeColumn> = Map::default();
        for (zone, series_id, offer) in bid.offers() {
            if !self.system.zones.contains(zone) {
                return Err(ModelError::UnknownZone(zone.clone()));
            }
            let series = self
                .timeline
                .series(series_id)
                .ok_or_else(|| ModelError::UnknownTimeseries(series_id.clone()))?;
            let weight = self.timeline.npv_weight(series);

            let column = scopes.entry(self.policy.scope(zone, series)).or_default();
            column.period = Some(series.period.clone());
            column.benefit += offer.benefit * weight * series.len() as f64;
            for (product, values) in offer.quantities.iter() {
                for (timepoint, &quantity) in series.timepoints.iter().zip(values) {
                    column
                        .quantities
                        .push(((zone.clone(), timepoint.clone(), product), quantity));
                }
            }
        }

        self.bids.push(RegisteredBid {
            id: bid.id(),
            scopes,
        });
        self.solution = None;
        self.graph.invalidate(Component::BidWeights);
        Ok(())
    }

    fn rebuild(&mut self) -> Result<(), Self::Error> {
        let pending = self.graph.pending();
        if pending.is_empty() {
            return Ok(());
        }
        for &component in pending.iter() {
            self.build(component);
            self.graph.mark_clean(component);
        }
        self.assembled = Some(self.assemble());
        event!(
            Level::DEBUG,
            rebuilt = ?pending,
            bids = self.bids.len(),
            columns = self.cache.q.len(),
            "rebuilt dispatch model"
        );
        Ok(())
    }

    async fn resolve(&mut self) -> Result<(), Self::Error> {
        if self.graph.is_stale() {
            return Err(ModelError::Stale);
        }
        let program = match self.assembled.as_ref() {
            Some(assembled) => Arc::clone(&assembled.program),
            None => return Err(ModelError::Stale),
        };
        let backend = self.backend.clone();

        // The solve is CPU-bound, so it runs on the blocking pool. Costs are in present
        // value, so the objective is brought to order one for the solver.
        let solution = tokio::task::spawn_blocking(move || {
            let scale = program.cost_scale();
            backend
                .solve(&program.scaled(scale))
                .map(|solution| solution.unscaled(scale))
        })
        .await??;

        event!(
            Level::INFO,
            objective = solution.objective,
            bids = self.bids.len(),
            "dispatch solved"
        );
        self.solution = Some(solution);
        Ok(())
    }

    fn has_duals(&self) -> bool {
        self.solution
            .as_ref()
            .is_some_and(|s| !s.duals.is_empty() && s.duals.iter().all(|d| d.is_finite()))
    }

    fn dual_price(
        &self,
        zone: &ZoneId,
        timepoint: &TimepointId,
        product: Product,
    ) -> Result<f64, Self::Error> {
        let solution = self.solved()?;
        self.timepoint_of(zone, timepoint)?;
        let assembled = self.assembled.as_ref().ok_or(ModelError::NoSolution)?;
        let row = match product {
            Product::Energy => assembled
                .energy_rows
                .get(&(zone.clone(), timepoint.clone()))
                .copied(),
            _ => assembled
                .reserve_rows
                .get(&(product, timepoint.clone()))
                .copied(),
        };
        // a product without a balance row is free
        Ok(row
            .and_then(|row| solution.duals.get(row))
            .copied()
            .unwrap_or(0.0))
    }

    fn demand(
        &self,
        zone: &ZoneId,
        timepoint: &TimepointId,
        product: Product,
    ) -> Result<f64, Self::Error> {
        let solution = self.solved()?;
        self.timepoint_of(zone, timepoint)?;
        Ok(self
            .cache
            .flexible_demand
            .get(&(zone.clone(), timepoint.clone(), product))
            .map(|terms| {
                terms
                    .iter()
                    .map(|&(column, quantity)| quantity * solution.x[column])
                    .sum()
            })
            .unwrap_or(0.0))
    }

    fn bid_weight(
        &self,
        bid: BidId,
        zone: &ZoneId,
        timeseries: &TimeseriesId,
    ) -> Result<f64, Self::Error> {
        let solution = self.solved()?;
        let series = self
            .timeline
            .series(timeseries)
            .ok_or_else(|| ModelError::UnknownTimeseries(timeseries.clone()))?;
        let column = self
            .cache
            .weights
            .get(&(bid, self.policy.scope(zone, series)))
            .ok_or(ModelError::UnknownBid(bid))?;
        Ok(solution.x[*column])
    }

    fn system_cost(&self) -> Result<f64, Self::Error> {
        Ok(self.solved()?.objective)
    }

    fn cost_components(&self) -> Vec<String> {
        self.registry
            .cost_components()
            .map(|(name, _)| name.to_owned())
            .collect()
    }

    fn cost_component(&self, name: &str, period: &PeriodId) -> Result<f64, Self::Error> {
        if !self.registry.has_cost(name) {
            return Err(ModelError::UnregisteredComponent(name.to_owned()));
        }
        let solution = self.solved()?;
        let npv: f64 = self
            .cache
            .supply
            .costs
            .iter()
            .chain(self.cache.welfare.iter())
            .filter(|term| term.component == name && &term.period == period)
            .map(|term| {
                let x = solution.x[term.column];
                term.linear * x + 0.5 * term.quadratic * x * x
            })
            .sum();
        Ok(self.timeline.to_annual(period, npv))
    }

    fn dual_costs(&self) -> Result<Vec<DualCost>, Self::Error> {
        let solution = self.solved()?;
        let assembled = self.assembled.as_ref().ok_or(ModelError::NoSolution)?;
        let costs = assembled
            .program
            .rows
            .iter()
            .zip(assembled.labels.iter())
            .zip(solution.duals.iter())
            .filter_map(|((row, label), &dual)| {
                let total_cost = -dual * row.rhs;
                (total_cost != 0.0).then(|| DualCost {
                    constraint: label.clone(),
                    direction: match row.sense {
                        Sense::Equal => Relation::Equal,
                        Sense::AtMost => Relation::AtMost,
                    },
                    bound: row.rhs,
                    dual,
                    total_cost,
                })
            })
            .collect();
        Ok(costs)
    }
}

impl<B> MasterProblem<B> {
    /// The weights of the latest solution, grouped by bid (for diagnostics)
    pub fn weights(&self) -> BTreeMap<BidId, Vec<(WeightScope, f64)>> {
        let mut weights: BTreeMap<BidId, Vec<(WeightScope, f64)>> = BTreeMap::new();
        if let Some(solution) = self.solution.as_ref() {
            for ((bid, scope), &column) in self.cache.weights.iter() {
                weights
                    .entry(*bid)
                    .or_default()
                    .push((scope.clone(), solution.x[column]));
            }
        }
        weights
    }
}
