use clap::Parser as _;
use fdrun::{BaseArgs, Commands, LogDigest, SolverLib};
use rstest::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCENARIO: &str = r#"{
    "timeline": {
        "periods": [{"id": "2030", "annual_to_npv": 7.5}],
        "timeseries": [{
            "id": "day",
            "period": "2030",
            "duration_hours": 6.0,
            "scale_to_year": 365.0,
            "timepoints": ["h00", "h06", "h12", "h18"]
        }]
    },
    "system": {
        "zones": ["oahu"],
        "generators": [
            {"name": "peaker", "zone": "oahu", "capacity": 1000.0, "marginal_cost": 180.0}
        ]
    },
    "baseline": [
        {"zone": "oahu", "timepoint": "h00", "load": 80.0, "price": 180.0},
        {"zone": "oahu", "timepoint": "h06", "load": 100.0, "price": 180.0},
        {"zone": "oahu", "timepoint": "h12", "load": 120.0, "price": 180.0},
        {"zone": "oahu", "timepoint": "h18", "load": 140.0, "price": 180.0}
    ]
}"#;

#[fixture]
fn dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn args(args: &[&str]) -> BaseArgs {
    BaseArgs::try_parse_from(std::iter::once("fdrun").chain(args.iter().copied())).unwrap()
}

#[test]
fn solver_defaults_to_clarabel() {
    let parsed = args(&["run", "scenario.json", "--lib", "osqp"]);
    assert!(matches!(
        parsed.command,
        Commands::Run {
            lib: SolverLib::Osqp,
            ..
        }
    ));
    let parsed = args(&["run", "scenario.json"]);
    assert!(matches!(
        parsed.command,
        Commands::Run {
            lib: SolverLib::Clarabel,
            tag: None,
            ..
        }
    ));
}

#[rstest]
#[tokio::test]
async fn run_writes_a_tagged_bid_log(dir: TempDir) {
    let scenario = write(dir.path(), "scenario.json", SCENARIO);
    let outputs = dir.path().join("outputs");
    let config = write(
        dir.path(),
        "fdr.toml",
        &format!(
            "[engine]\nseed_bids = false\n\n[output]\noutputs_dir = {:?}\n",
            outputs.display().to_string()
        ),
    );

    args(&[
        "run",
        scenario.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--tag",
        "cli",
    ])
    .evaluate()
    .await
    .unwrap();

    for stem in [
        "bid",
        "demand_response_summary",
        "energy_balance",
        "dual_costs",
    ] {
        assert!(outputs.join(format!("{stem}_cli.csv")).is_file(), "{stem}");
    }

    let digest = LogDigest::read(&outputs.join("bid_cli.csv")).unwrap();
    assert_eq!(digest.bids.len(), 2);
    assert_eq!(digest.bids[0].rows, 4);
    assert!(!digest.bids[0].priced);
    assert!(digest.bids[1].priced);
}

#[rstest]
#[tokio::test]
async fn missing_scenario_is_reported(dir: TempDir) {
    let result = args(&["run", dir.path().join("absent.json").to_str().unwrap()])
        .evaluate()
        .await;
    let error = result.unwrap_err();
    assert!(error.to_string().contains("absent.json"));
}
