use crate::{
    EngineError, Settings,
    convergence::{self, Gap},
    oracle::{self, PriceOracle, Prices},
    persist, report, seeder,
};
use fdr_core::{
    models::{
        Baseline, Bid, BidId, BidLedger, CostScope, DEMAND_RESPONSE_PROVISION, DEMAND_WELFARE,
        IterationState, IterationSummary, Map, Offer, Product, Profile, Snapshot, Timeline, ZoneId,
    },
    ports::{BidLog, DemandModel, DispatchModel, Reporter},
};
use std::time::Instant;
use tracing::{Instrument, Level, event, info_span};

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The demand model has not seen the baseline yet
    Uncalibrated,
    /// The first bids are being restored from the log or created
    SeedingOrResuming,
    /// Bids are being added one per iteration
    Iterating,
    /// The gap closed
    Converged,
    /// The iteration or time limit was reached first
    Stopped,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// [`Phase::Converged`] or [`Phase::Stopped`]
    pub phase: Phase,
    /// The number of dispatch solves
    pub iterations: usize,
    /// The number of bids in the ledger
    pub bids: usize,
    /// The last relative gap, absent if the loop stopped before measuring one
    pub gap: Option<f64>,
    /// The final summary
    pub summary: IterationSummary,
}

/// Drives the coordination loop.
///
/// The controller owns the bid ledger and the iteration state; the dispatch model, the
/// demand model, the bid log and the reporter are injected. Every step awaits the
/// previous one, so the demand model is never called concurrently and bids are
/// registered, persisted and solved strictly in id order.
pub struct Controller<M, D, L, R> {
    settings: Settings,
    timeline: Timeline,
    zones: Vec<ZoneId>,
    products: Vec<Product>,
    baseline: Baseline,
    baseline_expenditure: f64,
    model: M,
    demand: D,
    log: L,
    reporter: R,
    ledger: BidLedger,
    state: IterationState,
    phase: Phase,
    gap: Option<f64>,
}

impl<M, D, L, R> Controller<M, D, L, R>
where
    M: DispatchModel,
    D: DemandModel,
    L: BidLog,
    R: Reporter,
{
    /// Check the settings and register the flexible demand's components with the model
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        timeline: Timeline,
        zones: Vec<ZoneId>,
        baseline: Baseline,
        mut model: M,
        demand: D,
        log: L,
        reporter: R,
    ) -> Result<Self, EngineError> {
        if settings.reserve_products.contains(&Product::Energy) {
            return Err(EngineError::Configuration(
                "energy cannot be listed as a reserve product".into(),
            ));
        }
        if !(settings.optimality_gap.is_finite() && settings.optimality_gap >= 0.0) {
            return Err(EngineError::Configuration(format!(
                "optimality gap must be a non-negative number, got {}",
                settings.optimality_gap
            )));
        }
        if !(settings.weight_slack.is_finite() && settings.weight_slack >= 0.0) {
            return Err(EngineError::Configuration(format!(
                "weight slack must be a non-negative number, got {}",
                settings.weight_slack
            )));
        }
        if zones.is_empty() {
            return Err(EngineError::Configuration("no load zones".into()));
        }

        let products = settings.products();
        model
            .register_cost_component(DEMAND_WELFARE, CostScope::PerTimepoint)
            .map_err(EngineError::dispatch)?;
        for &product in products.iter().filter(|p| p.is_reserve()) {
            model
                .register_reserve_provision(product, DEMAND_RESPONSE_PROVISION)
                .map_err(EngineError::dispatch)?;
        }

        let ledger = BidLedger::new(&timeline, &zones, &products, settings.weight_policy());
        Ok(Self {
            settings,
            timeline,
            zones,
            products,
            baseline,
            baseline_expenditure: 0.0,
            model,
            demand,
            log,
            reporter,
            ledger,
            state: IterationState::default(),
            phase: Phase::Uncalibrated,
            gap: None,
        })
    }

    /// The current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every bid so far
    pub fn ledger(&self) -> &BidLedger {
        &self.ledger
    }

    /// The dispatch model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The iteration number and the latest solve
    pub fn state(&self) -> &IterationState {
        &self.state
    }

    /// Tear the controller apart, returning the dispatch model, the demand model, the
    /// bid log and the reporter
    pub fn into_parts(self) -> (M, D, L, R) {
        (self.model, self.demand, self.log, self.reporter)
    }

    /// Run the loop until it converges or a limit is reached, then write the final reports
    pub async fn run(&mut self) -> Result<RunOutcome, EngineError> {
        let started = Instant::now();
        self.calibrate()?;

        loop {
            let i = self.state.iteration;
            if i > 0 && self.out_of_budget(i, started) {
                self.phase = Phase::Stopped;
                break;
            }
            let converged = self
                .iterate()
                .instrument(info_span!("iteration", number = i))
                .await?;
            if converged {
                self.phase = Phase::Converged;
                break;
            }
            self.state.iteration += 1;
        }

        let summary = self.finish()?;
        let outcome = RunOutcome {
            phase: self.phase,
            iterations: self.state.iteration + usize::from(self.phase == Phase::Converged),
            bids: self.ledger.len(),
            gap: self.gap,
            summary,
        };
        event!(
            Level::INFO,
            phase = ?outcome.phase,
            iterations = outcome.iterations,
            bids = outcome.bids,
            gap = ?outcome.gap,
            "coordination finished"
        );
        Ok(outcome)
    }

    fn out_of_budget(&self, i: usize, started: Instant) -> bool {
        if let Some(max) = self.settings.max_iterations {
            if i >= max {
                event!(Level::WARN, max, "iteration limit reached before convergence");
                return true;
            }
        }
        if let Some(budget) = self.settings.time_budget {
            if started.elapsed() >= budget {
                event!(Level::WARN, ?budget, "time budget exhausted before convergence");
                return true;
            }
        }
        false
    }

    /// Validate the baseline and hand it to the demand model
    pub fn calibrate(&mut self) -> Result<(), EngineError> {
        if self.phase != Phase::Uncalibrated {
            return Ok(());
        }
        self.baseline.validate(&self.timeline, &self.zones)?;
        self.baseline_expenditure = self.baseline.expenditure(&self.timeline, &self.zones);
        event!(
            Level::INFO,
            expenditure = self.baseline_expenditure,
            "baseline expenditure"
        );

        let (timeline, baseline) = (&self.timeline, &self.baseline);
        let series: Vec<_> = self
            .zones
            .iter()
            .flat_map(|zone| timeline.timeseries().map(move |ts| baseline.series(zone, ts)))
            .collect();
        self.demand
            .calibrate(&series)
            .map_err(EngineError::demand)?;
        self.phase = Phase::SeedingOrResuming;
        Ok(())
    }

    // One pass of the loop: add a bid, re-solve, report. Returns whether the bid
    // added in this pass closed the gap.
    async fn iterate(&mut self) -> Result<bool, EngineError> {
        let mut converged = false;
        if self.state.iteration == 0 {
            self.initial_bids()?;
        } else {
            let previous = self.state.previous.take().ok_or(EngineError::MissingDuals)?;
            let result = self.next_bid(&previous);
            self.state.previous = Some(previous);
            converged = result?;
        }

        self.model.rebuild().map_err(EngineError::dispatch)?;
        self.model.resolve().await.map_err(EngineError::dispatch)?;
        self.post_solve()?;
        Ok(converged)
    }

    // Price the previous solve, ask for a bid and measure the gap it leaves
    fn next_bid(&mut self, previous: &Snapshot) -> Result<bool, EngineError> {
        let prev = convergence::previous_cost(previous, &self.timeline, &self.zones, &self.products);
        event!(
            Level::INFO,
            direct = prev.direct,
            welfare = prev.welfare,
            "previous cost"
        );
        self.check_weights()?;

        let oracle = PriceOracle::new(&self.timeline, &self.zones, &self.products, &self.baseline);
        let prices = oracle.prices(self.settings.pricing, Some(previous), &mut self.demand, true)?;
        let id = self.add_bid(prices, Some(previous))?;

        let Some(bid) = self.ledger.get(id) else {
            return Ok(false);
        };
        let best = convergence::lower_bound(previous, bid, &self.timeline, &self.zones, &self.products);
        event!(
            Level::INFO,
            direct = best.direct,
            welfare = best.welfare,
            "best cost"
        );

        let gap = Gap {
            previous_cost: prev.total(),
            best_cost: best.total(),
            baseline_expenditure: self.baseline_expenditure,
        };
        if gap.violates_bound() {
            event!(
                Level::WARN,
                previous = gap.previous_cost,
                best = gap.best_cost,
                "lower bound exceeds the current cost; the demand model may not be concave"
            );
        }
        let relative = gap.relative();
        self.gap = Some(relative);
        event!(
            Level::INFO,
            gap = relative,
            tolerance = self.settings.optimality_gap,
            "optimality gap"
        );
        Ok(gap.converged(self.settings.optimality_gap))
    }

    // Resume from the log, or seed, or fall back to one bid at baseline prices
    fn initial_bids(&mut self) -> Result<(), EngineError> {
        if self.resume()? {
            self.phase = Phase::Iterating;
            return Ok(());
        }

        let flat = self.settings.flat_pricing();
        if self.settings.seed_bids {
            let shapes = seeder::seed_shapes(flat);
            event!(Level::INFO, seeds = shapes.len(), "seeding bids");
            for shape in shapes.iter() {
                let prices = seeder::seed_prices(
                    shape,
                    &self.timeline,
                    &self.zones,
                    &self.products,
                    &self.baseline,
                );
                self.add_bid(prices, None)?;
            }
        } else {
            event!(Level::INFO, "requesting a single bid at baseline prices");
            let oracle = PriceOracle::new(&self.timeline, &self.zones, &self.products, &self.baseline);
            let prices = oracle.prices(self.settings.pricing, None, &mut self.demand, true)?;
            self.add_bid(prices, None)?;
        }
        self.phase = Phase::Iterating;
        Ok(())
    }

    // Restore the bids of a previous run with the same tag. Returns whether any were
    // restored.
    fn resume(&mut self) -> Result<bool, EngineError> {
        if !self.settings.read_saved_bids || !self.log.exists() {
            return Ok(false);
        }
        let rows = self.log.read().map_err(EngineError::bid_log)?;
        let bids = persist::replay(&rows, &self.timeline, &self.zones, &self.products)?;
        if bids.is_empty() {
            event!(Level::INFO, "bid log is empty");
            return Ok(false);
        }

        let seeds = seeder::seed_count(self.settings.flat_pricing());
        if self.settings.seed_bids && bids.len() < seeds {
            event!(
                Level::WARN,
                found = bids.len(),
                expected = seeds,
                "bid log holds fewer bids than the seeds; seeding again"
            );
            return Ok(false);
        }

        persist::restore(&mut self.ledger, bids)?;
        for bid in self.ledger.iter() {
            self.model.register_bid(bid).map_err(EngineError::dispatch)?;
        }
        event!(Level::INFO, bids = self.ledger.len(), "resumed from bid log");
        Ok(true)
    }

    // Ask the demand model for its answer to `prices` everywhere, then register and
    // persist the answers as one bid
    fn add_bid(&mut self, prices: Prices, previous: Option<&Snapshot>) -> Result<BidId, EngineError> {
        let flat = self.settings.flat_pricing();
        let mut offers = Map::with_capacity(self.zones.len() * self.timeline.timeseries().count());
        for zone in self.zones.iter() {
            for series in self.timeline.timeseries() {
                let key = (zone.clone(), series.id.clone());
                let profile = prices
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| Profile::zeros(&self.products, series.len()));
                let response = self
                    .demand
                    .bid(zone, series, &profile)
                    .map_err(EngineError::demand)?;
                let mut quantities = response.quantities;
                if flat {
                    quantities.zero_reserves();
                }
                offers.insert(
                    key,
                    Offer {
                        prices: profile,
                        quantities,
                        benefit: response.benefit,
                    },
                );
            }
        }

        let bid = self.ledger.append(offers)?;
        self.model.register_bid(bid).map_err(EngineError::dispatch)?;
        let id = bid.id();
        let rows = persist::bid_rows(bid, &self.timeline, &self.products, &self.baseline, previous);

        if id == BidId::FIRST {
            self.log.start(&self.products).map_err(EngineError::bid_log)?;
        }
        self.log.append(&rows).map_err(EngineError::bid_log)?;
        event!(Level::DEBUG, bid = %id, rows = rows.len(), "bid registered");
        Ok(id)
    }

    // Every bid weight must lie in [0, 1], up to the configured slack
    fn check_weights(&self) -> Result<(), EngineError> {
        let slack = self.settings.weight_slack;
        let count = (self.zones.len() * self.timeline.timeseries().count()).max(1) as f64;
        for bid in self.ledger.iter() {
            let mut total = 0.0;
            for zone in self.zones.iter() {
                for series in self.timeline.timeseries() {
                    let weight = self
                        .model
                        .bid_weight(bid.id(), zone, &series.id)
                        .map_err(EngineError::dispatch)?;
                    if weight < -slack || weight > 1.0 + slack {
                        return Err(EngineError::WeightOutOfRange {
                            bid: bid.id(),
                            zone: zone.clone(),
                            timeseries: series.id.clone(),
                            weight,
                        });
                    }
                    total += weight;
                }
            }
            let average = total / count;
            if average > 0.0 {
                event!(Level::DEBUG, bid = %bid.id(), average, "average bid weight");
            }
        }
        Ok(())
    }

    fn latest_bid(&self) -> BidId {
        self.ledger.last().map(Bid::id).unwrap_or(BidId::FIRST)
    }

    fn post_solve(&mut self) -> Result<(), EngineError> {
        if !self.model.has_duals() {
            return Err(EngineError::MissingDuals);
        }
        let snapshot = oracle::capture(&self.model, &self.ledger, &self.timeline, &self.zones)?;
        let ratio = self
            .state
            .previous
            .as_ref()
            .map(|previous| snapshot.system_cost / previous.system_cost);
        event!(
            Level::INFO,
            bids = self.ledger.len(),
            total_cost = snapshot.system_cost,
            ratio = ?ratio,
            "total cost"
        );

        let summary = report::summary(
            &self.model,
            self.settings.tag(),
            self.latest_bid(),
            &snapshot,
            &self.timeline,
            &self.zones,
            &self.products,
        )?;
        self.reporter
            .iteration(&summary)
            .map_err(EngineError::report)?;
        self.state.previous = Some(snapshot);
        Ok(())
    }

    // Final prices (without the revenue-neutral search), the final summary, the
    // energy balance and the dual costs
    fn finish(&mut self) -> Result<IterationSummary, EngineError> {
        let snapshot = self.state.previous.as_ref().ok_or(EngineError::MissingDuals)?;
        let oracle = PriceOracle::new(&self.timeline, &self.zones, &self.products, &self.baseline);
        let final_prices =
            oracle.prices(self.settings.pricing, Some(snapshot), &mut self.demand, false)?;

        let summary = report::summary(
            &self.model,
            self.settings.tag(),
            self.latest_bid(),
            snapshot,
            &self.timeline,
            &self.zones,
            &self.products,
        )?;
        let balance = report::energy_balance(
            self.ledger.last(),
            snapshot,
            &final_prices,
            &self.timeline,
            &self.zones,
            &self.products,
            &self.baseline,
        );
        self.reporter
            .finish(&summary, &balance)
            .map_err(EngineError::report)?;
        let dual_costs = self.model.dual_costs().map_err(EngineError::dispatch)?;
        self.reporter
            .dual_costs(&dual_costs)
            .map_err(EngineError::report)?;
        Ok(summary)
    }
}

impl<M, D, L, R> std::fmt::Debug for Controller<M, D, L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("phase", &self.phase)
            .field("iteration", &self.state.iteration)
            .field("bids", &self.ledger.len())
            .finish_non_exhaustive()
    }
}
