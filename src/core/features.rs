//! Derives the model input vector for a market from its recent price series.
//!
//! The builder never fails: sparse history falls back to the oldest known
//! price, missing aggregates fall back to the current price and any column the
//! schema names but the builder does not compute is filled with zero. Models
//! are trained against exactly this convention.

use crate::core::market::{MarketStats, PriceObservation, PriceStore};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::Path;
use tracing::debug;

/// Number of weeks of history fetched for the time-series features.
pub const HISTORY_WEEKS: usize = 20;

const LAG_WEEKS: [i64; 5] = [1, 2, 4, 8, 12];
const ROLLING_WINDOWS: [usize; 3] = [4, 8, 12];
const GROWTH_WEEKS: [usize; 3] = [1, 4, 12];

/// Every column the builder computes, in the order it computes them.
pub const NATIVE_COLUMNS: &[&str] = &[
    "month",
    "week_number",
    "year",
    "day_of_week",
    "quarter",
    "is_month_start",
    "is_month_end",
    "month_sin",
    "month_cos",
    "week_sin",
    "week_cos",
    "season_winter",
    "season_summer",
    "season_monsoon",
    "market_encoded",
    "market_avg_price",
    "market_volatility",
    "price_vs_market_avg",
    "price_lag_1",
    "price_lag_2",
    "price_lag_4",
    "price_lag_8",
    "price_lag_12",
    "price_ma_4",
    "price_std_4",
    "price_min_4",
    "price_max_4",
    "price_ma_8",
    "price_std_8",
    "price_min_8",
    "price_max_8",
    "price_ma_12",
    "price_std_12",
    "price_min_12",
    "price_max_12",
    "price_growth_1w",
    "price_growth_4w",
    "price_growth_12w",
    "price_momentum",
    "price_relative_strength",
];

/// Ordered list of input columns the loaded model expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Schema made of every computed column in computation order.
    pub fn native() -> Self {
        Self::new(NATIVE_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    /// Loads a schema saved as a JSON array of column names.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature schema: {}", path.display()))?;
        let schema: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse feature schema: {}", path.display()))?;
        debug!(
            "Loaded feature schema with {} columns",
            schema.columns.len()
        );
        Ok(schema)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// An all-zero vector in schema layout.
    pub fn zeros(&self) -> FeatureVector {
        self.project(&[])
    }

    /// Lays computed values out in schema order. Columns without a computed
    /// value become 0; computed values outside the schema are dropped.
    fn project(&self, computed: &[(&'static str, f64)]) -> FeatureVector {
        let by_name: HashMap<&str, f64> = computed.iter().copied().collect();
        let values = self
            .columns
            .iter()
            .map(|column| by_name.get(column.as_str()).copied().unwrap_or(0.0))
            .collect();
        FeatureVector {
            columns: self.columns.clone(),
            values,
        }
    }
}

/// Model input: values aligned with the schema's columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Store-derived inputs the builder needs besides the latest observation.
#[derive(Debug, Clone, Default)]
pub struct MarketContext {
    /// Recent observations, oldest first.
    history: Vec<PriceObservation>,
    /// Known markets, sorted and deduplicated.
    markets: Vec<String>,
    stats: MarketStats,
}

impl MarketContext {
    pub fn new(
        mut history: Vec<PriceObservation>,
        mut markets: Vec<String>,
        stats: MarketStats,
    ) -> Self {
        history.sort_by_key(|obs| obs.week_start_date);
        markets.sort();
        markets.dedup();
        Self {
            history,
            markets,
            stats,
        }
    }

    pub async fn fetch(store: &dyn PriceStore, market: &str) -> Result<Self> {
        let history = store.history(market, HISTORY_WEEKS).await?;
        let markets = store.markets().await?;
        let stats = store.stats(market).await?;
        debug!(
            market,
            history = history.len(),
            markets = markets.len(),
            "Fetched market context"
        );
        Ok(Self::new(history, markets, stats))
    }

    /// Rank of `market` among the sorted known markets, 0 when unknown.
    pub fn market_rank(&self, market: &str) -> usize {
        self.markets
            .binary_search_by(|m| m.as_str().cmp(market))
            .unwrap_or(0)
    }
}

/// Shifts `date` by `days`, leaving it unchanged if the result is out of range.
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(date)
}

/// Builds the feature vector for predicting `horizon_days` past `latest`.
pub fn build_features(
    latest: &PriceObservation,
    horizon_days: i64,
    context: &MarketContext,
    schema: &FeatureSchema,
) -> FeatureVector {
    let target = shift_days(latest.week_start_date, horizon_days);
    let current_price = latest.price();

    let mut features: Vec<(&'static str, f64)> = Vec::with_capacity(NATIVE_COLUMNS.len());
    calendar_features(target, &mut features);

    features.push((
        "market_encoded",
        context.market_rank(&latest.market_name) as f64,
    ));
    let market_avg = match context.stats.mean {
        Some(mean) if mean != 0.0 => mean,
        _ => current_price,
    };
    features.push(("market_avg_price", market_avg));
    features.push(("market_volatility", context.stats.stddev.unwrap_or(0.0)));
    features.push(("price_vs_market_avg", current_price - market_avg));

    let series: Vec<(NaiveDate, f64)> = if context.history.is_empty() {
        vec![(latest.week_start_date, current_price)]
    } else {
        context
            .history
            .iter()
            .map(|obs| (obs.week_start_date, obs.price()))
            .collect()
    };
    let prices: Vec<f64> = series.iter().map(|(_, p)| *p).collect();

    for (lag, name) in LAG_WEEKS.iter().zip([
        "price_lag_1",
        "price_lag_2",
        "price_lag_4",
        "price_lag_8",
        "price_lag_12",
    ]) {
        features.push((name, price_at_lag(&series, target, *lag)));
    }

    let mut moving_averages = HashMap::new();
    for (window, names) in ROLLING_WINDOWS.iter().zip([
        ["price_ma_4", "price_std_4", "price_min_4", "price_max_4"],
        ["price_ma_8", "price_std_8", "price_min_8", "price_max_8"],
        [
            "price_ma_12",
            "price_std_12",
            "price_min_12",
            "price_max_12",
        ],
    ]) {
        let stats = RollingStats::over_last(&prices, *window);
        moving_averages.insert(*window, stats.mean);
        features.push((names[0], stats.mean));
        features.push((names[1], stats.std));
        features.push((names[2], stats.min));
        features.push((names[3], stats.max));
    }

    for (weeks, name) in GROWTH_WEEKS
        .iter()
        .zip(["price_growth_1w", "price_growth_4w", "price_growth_12w"])
    {
        features.push((name, growth(&prices, *weeks)));
    }

    let ma_4 = moving_averages[&4];
    let ma_12 = moving_averages[&12];
    features.push(("price_momentum", current_price - ma_4));
    let relative_strength = if ma_12 != 0.0 {
        current_price / ma_12
    } else {
        0.0
    };
    features.push(("price_relative_strength", relative_strength));

    schema.project(&features)
}

fn calendar_features(target: NaiveDate, features: &mut Vec<(&'static str, f64)>) {
    let month = target.month();
    let week = target.iso_week().week();
    let is_month_end = target.succ_opt().is_none_or(|next| next.month() != month);

    features.push(("month", month as f64));
    features.push(("week_number", week as f64));
    features.push(("year", target.year() as f64));
    let weekday = target.weekday().num_days_from_monday();
    features.push(("day_of_week", weekday as f64));
    features.push(("quarter", ((month - 1) / 3 + 1) as f64));
    features.push(("is_month_start", flag(target.day() == 1)));
    features.push(("is_month_end", flag(is_month_end)));

    features.push(("month_sin", (2.0 * PI * month as f64 / 12.0).sin()));
    features.push(("month_cos", (2.0 * PI * month as f64 / 12.0).cos()));
    features.push(("week_sin", (2.0 * PI * week as f64 / 52.0).sin()));
    features.push(("week_cos", (2.0 * PI * week as f64 / 52.0).cos()));

    // Three seasons only: July through October all count as monsoon.
    features.push(("season_winter", flag(matches!(month, 11 | 12 | 1 | 2))));
    features.push(("season_summer", flag(matches!(month, 3..=6))));
    features.push(("season_monsoon", flag(matches!(month, 7..=10))));
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Latest price on or before `target - lag_weeks`, else the oldest price.
/// `series` must be non-empty and sorted oldest first.
fn price_at_lag(series: &[(NaiveDate, f64)], target: NaiveDate, lag_weeks: i64) -> f64 {
    let lag_date = shift_days(target, -7 * lag_weeks);
    series
        .iter()
        .rev()
        .find(|(date, _)| *date <= lag_date)
        .or_else(|| series.first())
        .map_or(0.0, |(_, price)| *price)
}

/// Relative change between the newest price and the one `weeks` points
/// earlier; 0 without enough points or with a zero base.
fn growth(prices: &[f64], weeks: usize) -> f64 {
    if prices.len() <= weeks {
        return 0.0;
    }
    let current = prices[prices.len() - 1];
    let previous = prices[prices.len() - 1 - weeks];
    if previous != 0.0 {
        (current - previous) / previous
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RollingStats {
    mean: f64,
    std: f64,
    min: f64,
    max: f64,
}

impl RollingStats {
    /// Stats over the last `window` prices, or over all of them when fewer
    /// are available.
    fn over_last(prices: &[f64], window: usize) -> Self {
        let slice = &prices[prices.len().saturating_sub(window)..];
        if slice.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let n = slice.len() as f64;
        let mean = slice.iter().sum::<f64>() / n;
        let std = (slice.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n).sqrt();
        Self {
            mean,
            std,
            min: slice.iter().copied().fold(f64::INFINITY, f64::min),
            max: slice.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}
