use fdr_core::{
    models::{BidId, Map, Product, TimeseriesId, ZoneId},
    ports::{BidLog as _, BidLogRow},
};
use fdr_csv::CsvBidLog;
use serde::Serialize;
use std::path::Path;

/// An overview of a bid log
#[derive(Debug, Serialize)]
pub struct LogDigest {
    pub products: Vec<Product>,
    pub bids: Vec<BidDigest>,
}

/// An overview of one bid
#[derive(Debug, Serialize)]
pub struct BidDigest {
    pub bid: BidId,
    pub rows: usize,
    /// The (zone, timeseries) pairs the bid covers
    pub offers: usize,
    /// Whether the bid was made after a dispatch solve
    pub priced: bool,
    /// Average price per product over the rows
    pub mean_price: Map<Product>,
    /// Total quantity per product over the rows
    pub total_quantity: Map<Product>,
    /// Benefit summed over the (zone, timeseries) pairs
    pub benefit: f64,
}

impl LogDigest {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let mut log = CsvBidLog::at(path);
        let rows = log.read()?;
        if rows.is_empty() {
            return Err(crate::CliError::EmptyLog(path.to_owned()))?;
        }
        Ok(Self::from_rows(log.products().to_vec(), &rows))
    }

    pub fn from_rows(products: Vec<Product>, rows: &[BidLogRow]) -> Self {
        let mut bids: Map<BidId, (BidDigest, Map<(ZoneId, TimeseriesId)>)> = Map::default();
        for row in rows {
            let (digest, offers) = bids.entry(row.bid).or_insert_with(|| {
                (
                    BidDigest {
                        bid: row.bid,
                        rows: 0,
                        offers: 0,
                        priced: false,
                        mean_price: Map::default(),
                        total_quantity: Map::default(),
                        benefit: 0.0,
                    },
                    Map::default(),
                )
            });
            digest.rows += 1;
            digest.priced |= row.marginal_cost.values().any(Option::is_some);
            for &product in products.iter() {
                digest
                    .mean_price
                    .accumulate(product, row.price.value_or_zero(&product));
                digest
                    .total_quantity
                    .accumulate(product, row.quantity.value_or_zero(&product));
            }
            // the benefit is repeated on every row of a (zone, timeseries)
            offers.insert((row.zone.clone(), row.timeseries.clone()), row.benefit);
        }

        let bids = bids
            .into_iter()
            .map(|(_, (mut digest, offers))| {
                let rows = digest.rows as f64;
                for price in digest.mean_price.values_mut() {
                    *price /= rows;
                }
                digest.offers = offers.len();
                digest.benefit = offers.values().sum();
                digest
            })
            .collect();

        Self { products, bids }
    }
}
