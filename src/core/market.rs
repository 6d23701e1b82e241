//! Market price data types and the store abstraction they are read through.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A single weekly price observation for a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub market_name: String,
    pub week_start_date: NaiveDate,
    pub price_per_quintal: Decimal,
}

impl PriceObservation {
    pub fn new(market_name: &str, week_start_date: NaiveDate, price_per_quintal: Decimal) -> Self {
        Self {
            market_name: market_name.to_string(),
            week_start_date,
            price_per_quintal,
        }
    }

    /// Price as a float for numeric work.
    pub fn price(&self) -> f64 {
        self.price_per_quintal.to_f64().unwrap_or_default()
    }
}

/// Aggregate price statistics over every observation of a market.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketStats {
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
}

impl MarketStats {
    /// Mean and population standard deviation of `prices`. Both are `None` for an
    /// empty slice.
    pub fn from_prices(prices: &[f64]) -> Self {
        if prices.is_empty() {
            return Self::default();
        }
        let n = prices.len() as f64;
        let mean = prices.iter().sum::<f64>() / n;
        let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean: Some(mean),
            stddev: Some(variance.sqrt()),
        }
    }
}

/// Read access to the weekly price series of every known market.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Most recent observation for `market`, or `None` if it has none.
    async fn latest(&self, market: &str) -> Result<Option<PriceObservation>>;

    /// Up to `weeks` most recent observations, newest first. Unknown markets
    /// yield an empty list.
    async fn history(&self, market: &str, weeks: usize) -> Result<Vec<PriceObservation>>;

    /// Distinct names of all markets with data, in no particular order.
    async fn markets(&self) -> Result<Vec<String>>;

    async fn stats(&self, market: &str) -> Result<MarketStats>;
}
