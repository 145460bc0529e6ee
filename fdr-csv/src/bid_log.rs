use crate::{CsvConfig, number};
use fdr_core::{
    models::{BidId, Map, Product, UnknownProduct},
    ports::{BidLog, BidLogRow},
};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{Level, event};

const FIXED_LEADING: [&str; 4] = ["bid_num", "load_zone", "timeseries", "timepoint"];
const FIXED_TRAILING: [&str; 3] = ["wtp", "base_price", "base_load"];

/// A bid log stored as a single CSV file, `{outputs_dir}/bid_{tag}.csv`.
///
/// Each row is one (bid, zone, timepoint), with a column group per product for
/// the marginal cost at the time of the bid, the price offered to the demand model
/// and the quantity it chose. The file is only ever truncated when a run starts
/// writing bid 1; otherwise rows are appended as bids are created.
#[derive(Debug)]
pub struct CsvBidLog {
    path: PathBuf,
    products: Vec<Product>,
}

impl CsvBidLog {
    /// A bid log located according to `config`
    pub fn new(config: &CsvConfig) -> Self {
        Self::at(config.path("bid"))
    }

    /// A bid log at an explicit path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            products: Vec::new(),
        }
    }

    /// The location of the log
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The products of the log's column groups, known once it is started or read
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    fn header(products: &[Product]) -> Vec<String> {
        let mut header: Vec<String> = FIXED_LEADING.iter().map(|s| s.to_string()).collect();
        for prefix in ["marginal_cost", "price", "bid"] {
            header.extend(products.iter().map(|p| format!("{prefix} {p}")));
        }
        header.extend(FIXED_TRAILING.iter().map(|s| s.to_string()));
        header
    }

    fn record(&self, row: &BidLogRow) -> Vec<String> {
        let mut record = vec![
            row.bid.to_string(),
            row.zone.to_string(),
            row.timeseries.to_string(),
            row.timepoint.to_string(),
        ];
        record.extend(self.products.iter().map(|p| {
            row.marginal_cost
                .get(p)
                .copied()
                .flatten()
                .map(number)
                .unwrap_or_default()
        }));
        record.extend(self.products.iter().map(|p| number(row.price.value_or_zero(p))));
        record.extend(self.products.iter().map(|p| number(row.quantity.value_or_zero(p))));
        record.push(number(row.benefit));
        record.push(number(row.base_price));
        record.push(number(row.base_load));
        record
    }
}

impl BidLog for CsvBidLog {
    type Error = CsvLogError;

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read(&mut self) -> Result<Vec<BidLogRow>, Self::Error> {
        let mut reader = csv::ReaderBuilder::new().from_path(&self.path)?;
        let layout = Layout::parse(reader.headers()?)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(layout.row(&record)?);
        }

        event!(
            Level::DEBUG,
            path = %self.path.display(),
            rows = rows.len(),
            "read bid log"
        );
        self.products = layout.products;
        Ok(rows)
    }

    fn start(&mut self, products: &[Product]) -> Result<(), Self::Error> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(Self::header(products))?;
        writer.flush()?;

        self.products = products.to_vec();
        event!(Level::INFO, path = %self.path.display(), "started a fresh bid log");
        Ok(())
    }

    fn append(&mut self, rows: &[BidLogRow]) -> Result<(), Self::Error> {
        if self.products.is_empty() {
            if let Some(row) = rows.first() {
                self.products = row.price.keys().copied().collect();
            }
        }

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for row in rows {
            writer.write_record(self.record(row))?;
        }
        writer.flush()?;
        Ok(())
    }
}

// Column positions of a bid log, recovered from its header
struct Layout {
    fixed: [usize; 7],
    products: Vec<Product>,
    // (marginal_cost, price, bid) per product
    groups: Vec<(usize, usize, usize)>,
}

impl Layout {
    fn parse(headers: &csv::StringRecord) -> Result<Self, CsvLogError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| CsvLogError::MissingColumn(name.to_owned()))
        };

        let mut fixed = [0; 7];
        for (slot, name) in fixed
            .iter_mut()
            .zip(FIXED_LEADING.iter().chain(FIXED_TRAILING.iter()))
        {
            *slot = find(name)?;
        }

        let products = headers
            .iter()
            .filter_map(|h| h.trim().strip_prefix("bid "))
            .map(str::parse)
            .collect::<Result<Vec<Product>, _>>()?;
        let groups = products
            .iter()
            .map(|p| {
                Ok((
                    find(&format!("marginal_cost {p}"))?,
                    find(&format!("price {p}"))?,
                    find(&format!("bid {p}"))?,
                ))
            })
            .collect::<Result<Vec<_>, CsvLogError>>()?;

        Ok(Self {
            fixed,
            products,
            groups,
        })
    }

    fn row(&self, record: &csv::StringRecord) -> Result<BidLogRow, CsvLogError> {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let text = |index: usize| record.get(index).unwrap_or_default().trim();
        let parse_error = |index: usize| CsvLogError::Parse {
            line,
            column: index,
            value: text(index).to_owned(),
        };
        let float = |index: usize| text(index).parse::<f64>().map_err(|_| parse_error(index));

        let [bid, zone, timeseries, timepoint, wtp, base_price, base_load] = self.fixed;
        let bid = text(bid).parse::<u64>().map_err(|_| parse_error(bid))?;

        let mut marginal_cost = Map::with_capacity(self.products.len());
        let mut price = Map::with_capacity(self.products.len());
        let mut quantity = Map::with_capacity(self.products.len());
        for (&product, &(mc, p, q)) in self.products.iter().zip(self.groups.iter()) {
            let mc = if text(mc).is_empty() {
                None
            } else {
                Some(float(mc)?)
            };
            marginal_cost.insert(product, mc);
            price.insert(product, float(p)?);
            quantity.insert(product, float(q)?);
        }

        Ok(BidLogRow {
            bid: BidId::from(bid),
            zone: text(zone).into(),
            timeseries: text(timeseries).into(),
            timepoint: text(timepoint).into(),
            marginal_cost,
            price,
            quantity,
            benefit: float(wtp)?,
            base_price: float(base_price)?,
            base_load: float(base_load)?,
        })
    }
}

/// The ways reading or writing the CSV files can fail.
#[derive(Debug, Error)]
pub enum CsvLogError {
    /// The file could not be created or opened
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid CSV
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// A required column is absent from the header
    #[error("bid log has no `{0}` column")]
    MissingColumn(String),
    /// A column group names an unknown product
    #[error(transparent)]
    Product(#[from] UnknownProduct),
    /// A cell could not be parsed as a number
    #[error("line {line}, column {column}: cannot parse `{value}`")]
    Parse {
        /// The line of the record
        line: u64,
        /// The 0-based column
        column: usize,
        /// The offending text
        value: String,
    },
}
