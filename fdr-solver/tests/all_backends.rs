#![allow(unused_macros)]
use rstest_reuse::template;

// This creates a testing "template" to allow for the injection of each backend
// implementation

#[template]
#[rstest]
#[case::clarabel(fdr_solver::clarabel::ClarabelBackend::default())]
#[case::osqp(fdr_solver::osqp::OsqpBackend::default())]
pub fn all_backends(#[case] backend: impl fdr_solver::Backend) -> () {}
