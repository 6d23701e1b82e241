//! Bulk import of weekly market prices from CSV exports.

use crate::core::market::PriceObservation;
use crate::store::disk::FjallPriceStore;
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct PriceRow {
    market: String,
    date_started: String,
    price_per_quintal: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub written: usize,
    /// Rows without a usable price. Their market is still listed and any
    /// price stored for that week is cleared.
    pub skipped: usize,
}

pub fn load_csv_path<P: AsRef<Path>>(path: P, store: &FjallPriceStore) -> Result<LoadSummary> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open price file: {}", path.display()))?;
    load_csv(file, store).with_context(|| format!("Failed to load {}", path.display()))
}

/// Reads rows with `market`, `date_started` and `price_per_quintal` columns
/// into `store`. Extra columns are ignored; a repeated market and week
/// overwrites the earlier row, including with a missing price.
pub fn load_csv<R: Read>(reader: R, store: &FjallPriceStore) -> Result<LoadSummary> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut summary = LoadSummary::default();

    for (index, result) in rdr.deserialize::<PriceRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.with_context(|| format!("Malformed row on line {line}"))?;
        let date = NaiveDate::parse_from_str(row.date_started.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow!("Invalid date '{}' on line {line}: {e}", row.date_started))?;

        let price = row
            .price_per_quintal
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .and_then(|p| Decimal::from_str(p).ok());
        match price {
            Some(price) if !price.is_sign_negative() => {
                store.insert(&PriceObservation::new(row.market.trim(), date, price))?;
                summary.written += 1;
            }
            Some(price) => {
                warn!("Clearing week with negative price {} on line {}", price, line);
                store.clear(row.market.trim(), date)?;
                summary.skipped += 1;
            }
            None => {
                debug!("Clearing week without price on line {}", line);
                store.clear(row.market.trim(), date)?;
                summary.skipped += 1;
            }
        }
    }

    store.persist()?;
    Ok(summary)
}
