//! Forecasts one market across a fixed ladder of horizons.

use crate::core::error::PredictError;
use crate::core::prediction::{Predictor, Trend};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

/// Horizons, in days, covered by a scenario report, in report order.
pub const SCENARIO_HORIZONS: [i64; 6] = [7, 14, 21, 30, 45, 60];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioEntry {
    pub horizon_days: i64,
    pub prediction_date: NaiveDate,
    pub predicted_price: f64,
    pub confidence: f64,
    pub change_percent: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedHorizon {
    pub horizon_days: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub market_name: String,
    pub entries: Vec<ScenarioEntry>,
    pub skipped: Vec<SkippedHorizon>,
}

impl Predictor {
    /// Forecasts `market` at every horizon in [`SCENARIO_HORIZONS`], bypassing
    /// the prediction cache. Horizons that fail are reported as skipped; an
    /// unknown market yields an empty report.
    pub async fn scenarios(&self, market: &str) -> Result<ScenarioReport, PredictError> {
        let mut report = ScenarioReport {
            market_name: market.to_string(),
            ..Default::default()
        };
        let latest = match self.latest(market).await {
            Ok(latest) => latest,
            Err(PredictError::MarketNotFound(_)) => return Ok(report),
            Err(e) => return Err(e),
        };

        for horizon_days in SCENARIO_HORIZONS {
            match self.forecast(&latest, horizon_days).await {
                Ok(forecast) => report.entries.push(ScenarioEntry {
                    horizon_days,
                    prediction_date: forecast.prediction_date,
                    predicted_price: forecast.predicted_price,
                    confidence: forecast.confidence,
                    change_percent: forecast.change_percent,
                    trend: forecast.trend,
                }),
                Err(e) => {
                    warn!(
                        market,
                        horizon_days,
                        error = %e,
                        "Skipping scenario horizon"
                    );
                    report.skipped.push(SkippedHorizon {
                        horizon_days,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}
