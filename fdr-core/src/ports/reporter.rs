use crate::models::{DualCost, EnergyBalanceRow, IterationSummary};

/// Sink for the run's reports.
pub trait Reporter {
    /// Error type for reporting failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Record the summary of one iteration
    fn iteration(&mut self, summary: &IterationSummary) -> Result<(), Self::Error>;

    /// Record the final summary and energy balance once the loop has stopped
    fn finish(
        &mut self,
        summary: &IterationSummary,
        balance: &[EnergyBalanceRow],
    ) -> Result<(), Self::Error>;

    /// Record the costs the final solution attributes to each constraint
    fn dual_costs(&mut self, costs: &[DualCost]) -> Result<(), Self::Error>;
}
