use approx::{assert_abs_diff_eq, assert_relative_eq};
use fdr_core::{
    models::{
        BidId, CostScope, DEMAND_RESPONSE_PROVISION, DEMAND_WELFARE, Product, Relation,
        WeightPolicy, ZoneId,
    },
    ports::DispatchModel,
};
use fdr_solver::{GENERATION, MasterProblem, ModelError, ReserveRequirement};
use rstest::*;
use rstest_reuse::{self, *};

mod all_backends;
use all_backends::all_backends;

mod common;
use common::*;

const TOL: f64 = 1e-3;

fn model<B: fdr_solver::Backend>(backend: B, system: fdr_solver::DispatchSystem) -> MasterProblem<B> {
    let mut model = MasterProblem::new(backend, one_hour(), system, WeightPolicy::default()).unwrap();
    model
        .register_cost_component(DEMAND_WELFARE, CostScope::PerTimepoint)
        .unwrap();
    model
}

#[apply(all_backends)]
#[tokio::test]
async fn weight_settles_at_the_kink(backend: impl fdr_solver::Backend) {
    // Bid 1 consumes 4 MW for free, bid 2 consumes 8 MW for $60/h. Moving weight towards
    // bid 2 is worth 60 - 4p per unit, so it stops where the cheap unit runs out (5 MW),
    // and the price settles at 15.
    let timeline = one_hour();
    let zones = vec![ZoneId::from("z")];
    let mut ledger = ledger(&timeline, &zones, &[Product::Energy]);
    append_bid(&mut ledger, &timeline, &zones, &[(Product::Energy, 4.0)], 0.0);
    append_bid(&mut ledger, &timeline, &zones, &[(Product::Energy, 8.0)], 60.0);

    let mut model = model(backend, two_units());
    for bid in ledger.iter() {
        model.register_bid(bid).unwrap();
    }
    model.rebuild().unwrap();
    model.resolve().await.unwrap();

    let (z, t1, day) = (&zones[0], &"t1".into(), &"day".into());
    assert!(model.has_duals());
    assert_abs_diff_eq!(model.dual_price(z, t1, Product::Energy).unwrap(), 15.0, epsilon = TOL);
    assert_abs_diff_eq!(model.demand(z, t1, Product::Energy).unwrap(), 5.0, epsilon = TOL);
    assert_abs_diff_eq!(model.bid_weight(BidId::from(2), z, day).unwrap(), 0.25, epsilon = TOL);

    let total: f64 = ledger
        .iter()
        .map(|bid| model.bid_weight(bid.id(), z, day).unwrap())
        .sum();
    assert_abs_diff_eq!(total, 1.0, epsilon = TOL);

    // 5 MW from the cheap unit, and -60 * 0.25 of welfare
    assert_abs_diff_eq!(model.cost_component(GENERATION, &"2030".into()).unwrap(), 50.0, epsilon = 1e-2);
    assert_abs_diff_eq!(
        model.cost_component(DEMAND_WELFARE, &"2030".into()).unwrap(),
        -15.0,
        epsilon = 1e-2
    );
    assert_abs_diff_eq!(model.system_cost().unwrap(), 35.0, epsilon = 1e-2);
}

#[apply(all_backends)]
#[tokio::test]
async fn valuable_bid_takes_everything(backend: impl fdr_solver::Backend) {
    let timeline = one_hour();
    let zones = vec![ZoneId::from("z")];
    let mut ledger = ledger(&timeline, &zones, &[Product::Energy]);
    append_bid(&mut ledger, &timeline, &zones, &[(Product::Energy, 4.0)], 0.0);
    append_bid(&mut ledger, &timeline, &zones, &[(Product::Energy, 8.0)], 100.0);

    let mut model = model(backend, two_units());
    for bid in ledger.iter() {
        model.register_bid(bid).unwrap();
    }
    model.rebuild().unwrap();
    model.resolve().await.unwrap();

    let (z, t1) = (&zones[0], &"t1".into());
    assert_abs_diff_eq!(model.dual_price(z, t1, Product::Energy).unwrap(), 20.0, epsilon = TOL);
    assert_abs_diff_eq!(model.demand(z, t1, Product::Energy).unwrap(), 8.0, epsilon = TOL);
}

#[apply(all_backends)]
#[tokio::test]
async fn congestion_separates_prices(backend: impl fdr_solver::Backend) {
    let timeline = one_hour();
    let zones: Vec<ZoneId> = vec!["a".into(), "b".into()];
    let mut ledger = ledger(&timeline, &zones, &[Product::Energy]);
    append_zonal_bid(&mut ledger, &timeline, &[("a", 3.0), ("b", 5.0)], 0.0);

    let mut model = model(backend, two_zones());
    model.register_bid(ledger.last().unwrap()).unwrap();
    model.rebuild().unwrap();
    model.resolve().await.unwrap();

    let t1 = &"t1".into();
    assert_abs_diff_eq!(model.dual_price(&zones[0], t1, Product::Energy).unwrap(), 10.0, epsilon = TOL);
    assert_abs_diff_eq!(model.dual_price(&zones[1], t1, Product::Energy).unwrap(), 30.0, epsilon = TOL);
}

// A single linear unit serving one 100 MW bid, with every cost weighted by 6 h * 365 * 7.5
async fn present_value_peaker<B: fdr_solver::Backend>(backend: B) -> MasterProblem<B> {
    let timeline = present_value_day();
    let zones = vec![ZoneId::from("z")];
    let mut ledger = ledger(&timeline, &zones, &[Product::Energy]);
    append_bid(&mut ledger, &timeline, &zones, &[(Product::Energy, 100.0)], 0.0);

    let system = fdr_solver::DispatchSystem {
        zones,
        generators: vec![generator("peaker", "z", 1000.0, 180.0)],
        lines: vec![],
        reserves: vec![],
        fixed_load: vec![],
        unserved_energy_penalty: 10_000.0,
    };
    let mut model = MasterProblem::new(backend, timeline, system, WeightPolicy::default()).unwrap();
    model
        .register_cost_component(DEMAND_WELFARE, CostScope::PerTimepoint)
        .unwrap();
    model.register_bid(ledger.last().unwrap()).unwrap();
    model.rebuild().unwrap();
    model.resolve().await.unwrap();
    model
}

#[apply(all_backends)]
#[tokio::test]
async fn linear_costs_in_present_value(backend: impl fdr_solver::Backend) {
    let model = present_value_peaker(backend).await;
    let timeline = model.timeline().clone();
    let zones = [ZoneId::from("z")];

    let series = timeline.timeseries().next().unwrap();
    let weight = timeline.npv_weight(series);
    assert!(model.has_duals());
    for tp in ["h00", "h06", "h12", "h18"] {
        let tp = &tp.into();
        assert_abs_diff_eq!(
            model.dual_price(&zones[0], tp, Product::Energy).unwrap() / weight,
            180.0,
            epsilon = 1e-2
        );
        assert_abs_diff_eq!(model.demand(&zones[0], tp, Product::Energy).unwrap(), 100.0, epsilon = TOL);
    }
    assert_relative_eq!(
        model.cost_component(GENERATION, &"2030".into()).unwrap(),
        180.0 * 100.0 * 6.0 * 365.0 * 4.0,
        max_relative = 1e-5
    );
}

#[apply(all_backends)]
#[tokio::test]
async fn dual_costs_account_for_the_objective(backend: impl fdr_solver::Backend) {
    let model = present_value_peaker(backend).await;
    let objective = model.system_cost().unwrap();
    let costs = model.dual_costs().unwrap();

    // Without fixed load, the whole cost is attributed to the convexity of the bid weights
    let convexity = costs
        .iter()
        .find(|cost| cost.constraint == "convexity[system,day]")
        .unwrap();
    assert_eq!(convexity.direction, Relation::Equal);
    assert_eq!(convexity.bound, 1.0);
    assert_relative_eq!(convexity.total_cost, objective, max_relative = 1e-3);

    // bounds at zero attribute nothing
    assert!(costs.iter().all(|cost| cost.bound != 0.0));
    assert!(!costs.iter().any(|cost| cost.constraint.starts_with("energy_balance")));
}

#[apply(all_backends)]
#[tokio::test]
async fn dual_costs_need_a_solution(backend: impl fdr_solver::Backend) {
    let model = model(backend, two_units());
    assert!(matches!(model.dual_costs(), Err(ModelError::NoSolution)));
}

fn with_reserve(mut system: fdr_solver::DispatchSystem) -> fdr_solver::DispatchSystem {
    system.generators[0].reserve_capable = true;
    system.reserves.push(ReserveRequirement {
        product: Product::ReserveUp,
        timepoint: "t1".into(),
        quantity: 2.0,
    });
    system
}

#[apply(all_backends)]
#[tokio::test]
async fn reserve_price_is_opportunity_cost(backend: impl fdr_solver::Backend) {
    // Holding 2 MW of headroom on the cheap unit pushes 1 MW onto the expensive one
    let timeline = one_hour();
    let zones = vec![ZoneId::from("z")];
    let mut ledger = ledger(&timeline, &zones, &[Product::Energy]);
    append_bid(&mut ledger, &timeline, &zones, &[(Product::Energy, 4.0)], 0.0);

    let mut model = model(backend, with_reserve(two_units()));
    model.register_bid(ledger.last().unwrap()).unwrap();
    model.rebuild().unwrap();
    model.resolve().await.unwrap();

    let (z, t1) = (&zones[0], &"t1".into());
    assert_abs_diff_eq!(model.dual_price(z, t1, Product::Energy).unwrap(), 20.0, epsilon = TOL);
    assert_abs_diff_eq!(model.dual_price(z, t1, Product::ReserveUp).unwrap(), 10.0, epsilon = TOL);
    assert_eq!(model.dual_price(z, t1, Product::ReserveDown).unwrap(), 0.0);
}

#[apply(all_backends)]
#[tokio::test]
async fn flexible_demand_can_carry_reserve(backend: impl fdr_solver::Backend) {
    let timeline = one_hour();
    let zones = vec![ZoneId::from("z")];
    let products = [Product::Energy, Product::ReserveUp];
    let mut ledger = ledger(&timeline, &zones, &products);
    append_bid(
        &mut ledger,
        &timeline,
        &zones,
        &[(Product::Energy, 4.0), (Product::ReserveUp, -2.0)],
        0.0,
    );

    let mut model = model(backend, with_reserve(two_units()));
    model
        .register_reserve_provision(Product::ReserveUp, DEMAND_RESPONSE_PROVISION)
        .unwrap();
    model.register_bid(ledger.last().unwrap()).unwrap();
    model.rebuild().unwrap();
    model.resolve().await.unwrap();

    let (z, t1) = (&zones[0], &"t1".into());
    assert_abs_diff_eq!(model.dual_price(z, t1, Product::Energy).unwrap(), 10.0, epsilon = TOL);
    assert_abs_diff_eq!(model.dual_price(z, t1, Product::ReserveUp).unwrap(), 0.0, epsilon = TOL);
    assert_abs_diff_eq!(model.demand(z, t1, Product::ReserveUp).unwrap(), -2.0, epsilon = TOL);
}

#[rstest]
#[tokio::test]
async fn stale_model_refuses_to_solve() {
    let timeline = one_hour();
    let zones = vec![ZoneId::from("z")];
    let mut ledger = ledger(&timeline, &zones, &[Product::Energy]);
    append_bid(&mut ledger, &timeline, &zones, &[(Product::Energy, 4.0)], 0.0);

    let mut model = model(fdr_solver::clarabel::ClarabelBackend::default(), two_units());
    model.register_bid(ledger.last().unwrap()).unwrap();
    assert!(model.program().is_none());
    assert!(matches!(model.resolve().await, Err(ModelError::Stale)));

    model.rebuild().unwrap();
    assert!(model.program().is_some());
    assert!(model.resolve().await.is_ok());
}

#[rstest]
fn duplicate_bids_are_rejected() {
    let timeline = one_hour();
    let zones = vec![ZoneId::from("z")];
    let mut ledger = ledger(&timeline, &zones, &[Product::Energy]);
    append_bid(&mut ledger, &timeline, &zones, &[(Product::Energy, 4.0)], 0.0);

    let mut model = model(fdr_solver::clarabel::ClarabelBackend::default(), two_units());
    let bid = ledger.last().unwrap();
    model.register_bid(bid).unwrap();
    assert!(matches!(
        model.register_bid(bid),
        Err(ModelError::DuplicateBid(id)) if id == BidId::FIRST
    ));
}

#[rstest]
fn welfare_component_must_be_registered() {
    let timeline = one_hour();
    let zones = vec![ZoneId::from("z")];
    let mut ledger = ledger(&timeline, &zones, &[Product::Energy]);
    append_bid(&mut ledger, &timeline, &zones, &[(Product::Energy, 4.0)], 0.0);

    let mut model = MasterProblem::new(
        fdr_solver::clarabel::ClarabelBackend::default(),
        timeline,
        two_units(),
        WeightPolicy::default(),
    )
    .unwrap();
    assert!(matches!(
        model.register_bid(ledger.last().unwrap()),
        Err(ModelError::UnregisteredComponent(_))
    ));
}

#[rstest]
fn reserve_provision_needs_a_requirement() {
    let mut model = model(fdr_solver::clarabel::ClarabelBackend::default(), two_units());
    assert!(matches!(
        model.register_reserve_provision(Product::ReserveUp, DEMAND_RESPONSE_PROVISION),
        Err(ModelError::NoReserveRequirement(Product::ReserveUp))
    ));
}
