use crate::{CsvConfig, CsvLogError, number};
use fdr_core::{
    models::{DualCost, EnergyBalanceRow, IterationSummary, Product, ProductBalance},
    ports::Reporter,
};
use std::{
    fs::{self, File, OpenOptions},
    path::Path,
};
use tracing::{Level, event};

/// Writes the coordination reports as CSV tables.
///
/// The per-iteration summary accumulates across runs with the same tag: its header
/// is written only when the file is created. The final summary, the energy
/// balance and the dual costs are rewritten from scratch when the loop stops.
#[derive(Debug, Clone)]
pub struct CsvReporter {
    config: CsvConfig,
}

impl CsvReporter {
    /// A reporter writing into `config.outputs_dir`
    pub fn new(config: CsvConfig) -> Self {
        Self { config }
    }

    fn summary_header(summary: &IterationSummary) -> Vec<String> {
        let mut header = vec!["tag".into(), "iteration".into(), "total_cost".into()];
        header.extend(
            summary
                .direct_cost_per_year
                .keys()
                .map(|p| format!("total_direct_costs_per_year_{p}")),
        );
        header.extend(
            summary
                .welfare_cost_per_year
                .keys()
                .map(|p| format!("dr_welfare_cost_{p}")),
        );
        header.extend(
            summary
                .payment_per_year
                .keys()
                .map(|(product, p)| format!("{product} payment {p}")),
        );
        header.extend(
            summary
                .sold_per_year
                .keys()
                .map(|(product, p)| format!("{product} sold {p}")),
        );
        header
    }

    fn summary_record(summary: &IterationSummary) -> Vec<String> {
        let mut record = vec![
            summary.tag.clone(),
            summary.bid.to_string(),
            number(summary.total_cost),
        ];
        record.extend(summary.direct_cost_per_year.values().copied().map(number));
        record.extend(summary.welfare_cost_per_year.values().copied().map(number));
        record.extend(summary.payment_per_year.values().copied().map(number));
        record.extend(summary.sold_per_year.values().copied().map(number));
        record
    }

    fn create(&self, path: &Path) -> Result<File, CsvLogError> {
        fs::create_dir_all(&self.config.outputs_dir)?;
        Ok(File::create(path)?)
    }
}

impl Reporter for CsvReporter {
    type Error = CsvLogError;

    fn iteration(&mut self, summary: &IterationSummary) -> Result<(), Self::Error> {
        let path = self.config.path("demand_response_summary");
        let fresh = !path.is_file();
        fs::create_dir_all(&self.config.outputs_dir)?;
        let file = OpenOptions::new().append(true).create(true).open(&path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(Self::summary_header(summary))?;
        }
        writer.write_record(Self::summary_record(summary))?;
        writer.flush()?;
        Ok(())
    }

    fn finish(
        &mut self,
        summary: &IterationSummary,
        balance: &[EnergyBalanceRow],
    ) -> Result<(), Self::Error> {
        let path = self.config.path("demand_response_summary_final");
        let mut writer = csv::Writer::from_writer(self.create(&path)?);
        writer.write_record(Self::summary_header(summary))?;
        writer.write_record(Self::summary_record(summary))?;
        writer.flush()?;

        let path = self.config.path("energy_balance");
        let mut writer = csv::Writer::from_writer(self.create(&path)?);
        let products: Vec<Product> = balance
            .first()
            .map(|row| row.products.keys().copied().collect())
            .unwrap_or_default();

        let mut header: Vec<String> = vec!["load_zone".into(), "period".into(), "timepoint".into()];
        for label in ["offered price", "bid q", "final mc", "final price", "final q"] {
            header.extend(products.iter().map(|p| format!("{label} {p}")));
        }
        header.extend(["peak_day", "base_load", "base_price"].map(String::from));
        writer.write_record(&header)?;

        let columns: [fn(&ProductBalance) -> f64; 5] = [
            |b| b.offered_price,
            |b| b.bid_quantity,
            |b| b.final_marginal_cost,
            |b| b.final_price,
            |b| b.final_quantity,
        ];
        for row in balance {
            let mut record = vec![
                row.zone.to_string(),
                row.period.to_string(),
                row.timepoint.to_string(),
            ];
            for column in columns {
                record.extend(products.iter().map(|p| {
                    number(row.products.get(p).map(column).unwrap_or_default())
                }));
            }
            record.push(if row.peak_day { "peak" } else { "typical" }.to_owned());
            record.push(number(row.base_load));
            record.push(number(row.base_price));
            writer.write_record(&record)?;
        }
        writer.flush()?;

        event!(
            Level::INFO,
            dir = %self.config.outputs_dir.display(),
            rows = balance.len(),
            "wrote final reports"
        );
        Ok(())
    }

    fn dual_costs(&mut self, costs: &[DualCost]) -> Result<(), Self::Error> {
        let path = self.config.path("dual_costs");
        let mut writer = csv::Writer::from_writer(self.create(&path)?);
        writer.write_record(["constraint", "direction", "bound", "dual", "total_cost"])?;
        for cost in costs {
            writer.write_record([
                cost.constraint.clone(),
                cost.direction.to_string(),
                number(cost.bound),
                number(cost.dual),
                number(cost.total_cost),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}
