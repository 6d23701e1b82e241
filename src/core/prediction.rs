//! Assembles model output into prediction results for single markets and
//! batches, with a TTL cache in front of the single-market path.

use crate::core::cache::KeyValueCollection;
use crate::core::confidence::confidence;
use crate::core::error::PredictError;
use crate::core::features::{FeatureSchema, MarketContext, build_features, shift_days};
use crate::core::market::{PriceObservation, PriceStore};
use crate::core::model::PriceModel;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the collection holding cached predictions.
pub const CACHE_COLLECTION: &str = "predictions";

/// Default lifetime of a cached prediction.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    /// `Up` only when the prediction is strictly above the current price.
    pub fn between(current_price: f64, predicted_price: f64) -> Self {
        if predicted_price > current_price {
            Trend::Up
        } else {
            Trend::Down
        }
    }
}

impl Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Trend::Up => "up",
                Trend::Down => "down",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub market_name: String,
    pub current_price: f64,
    pub current_price_date: NaiveDate,
    pub predicted_price: f64,
    pub horizon_days: i64,
    pub prediction_date: NaiveDate,
    pub confidence: f64,
    pub change_percent: f64,
    pub trend: Trend,
    /// When the prediction was computed; cached results keep their original time.
    pub timestamp: DateTime<Utc>,
}

/// Model output for one horizon plus the values derived from it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Forecast {
    pub predicted_price: f64,
    pub prediction_date: NaiveDate,
    pub confidence: f64,
    pub change_percent: f64,
    pub trend: Trend,
}

/// One item of a batch: a prediction or the reason there is none.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Prediction(PredictionResult),
    Error { market_name: String, error: String },
}

impl BatchEntry {
    pub fn market_name(&self) -> &str {
        match self {
            BatchEntry::Prediction(result) => &result.market_name,
            BatchEntry::Error { market_name, .. } => market_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub markets: usize,
    pub model: String,
    pub feature_columns: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_error: Option<String>,
}

/// Serves price predictions from a price store and a trained model.
pub struct Predictor {
    store: Arc<dyn PriceStore>,
    model: Arc<dyn PriceModel>,
    schema: Arc<FeatureSchema>,
    cache: Option<Arc<dyn KeyValueCollection>>,
    cache_ttl: Duration,
}

impl Predictor {
    pub fn new(
        store: Arc<dyn PriceStore>,
        model: Arc<dyn PriceModel>,
        schema: Arc<FeatureSchema>,
    ) -> Self {
        Self {
            store,
            model,
            schema,
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn KeyValueCollection>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    pub fn store(&self) -> &dyn PriceStore {
        self.store.as_ref()
    }

    /// Reads the market list and sends the model an all-zero vector. A store
    /// failure is an error; a model failure is reported as `degraded`.
    pub async fn health(&self) -> Result<HealthStatus, PredictError> {
        let markets = self.store.markets().await.map_err(PredictError::Store)?;
        let model_error = match self.model.predict(&self.schema.zeros()).await {
            Ok(_) => None,
            Err(e) => {
                warn!(
                    model = self.model.name(),
                    "Model health check failed: {:#}", e
                );
                Some(format!("{e:#}"))
            }
        };
        let status = if model_error.is_some() {
            "degraded"
        } else {
            "ok"
        };
        Ok(HealthStatus {
            status,
            markets: markets.len(),
            model: self.model.name().to_string(),
            feature_columns: self.schema.columns().len(),
            model_error,
        })
    }

    /// Predicts the price of `market` `horizon_days` after its latest
    /// observation. Repeated requests within the cache TTL return the stored
    /// result unchanged.
    pub async fn predict(
        &self,
        market: &str,
        horizon_days: i64,
    ) -> Result<PredictionResult, PredictError> {
        let key = cache_key(market, horizon_days);
        if let Some(cached) = self.cached(&key).await {
            debug!(market, horizon_days, "Returning cached prediction");
            return Ok(cached);
        }

        let latest = self.latest(market).await?;
        let forecast = self.forecast(&latest, horizon_days).await?;
        let result = PredictionResult {
            market_name: market.to_string(),
            current_price: latest.price(),
            current_price_date: latest.week_start_date,
            predicted_price: forecast.predicted_price,
            horizon_days,
            prediction_date: forecast.prediction_date,
            confidence: forecast.confidence,
            change_percent: forecast.change_percent,
            trend: forecast.trend,
            timestamp: Utc::now(),
        };
        info!(
            market,
            horizon_days,
            predicted_price = result.predicted_price,
            "Computed prediction"
        );

        self.remember(&key, &result).await;
        Ok(result)
    }

    /// Predicts every market in `markets`, keeping request order. Failures
    /// become error entries instead of failing the batch.
    pub async fn predict_batch(&self, markets: &[String], horizon_days: i64) -> Vec<BatchEntry> {
        let futures = markets.iter().map(|market| async move {
            match self.predict(market, horizon_days).await {
                Ok(result) => BatchEntry::Prediction(result),
                Err(e) => {
                    debug!(market = %market, error = %e, "Batch item failed");
                    BatchEntry::Error {
                        market_name: market.clone(),
                        error: e.to_string(),
                    }
                }
            }
        });
        join_all(futures).await
    }

    pub(crate) async fn latest(&self, market: &str) -> Result<PriceObservation, PredictError> {
        self.store
            .latest(market)
            .await
            .map_err(PredictError::Store)?
            .ok_or_else(|| PredictError::MarketNotFound(market.to_string()))
    }

    pub(crate) async fn forecast(
        &self,
        latest: &PriceObservation,
        horizon_days: i64,
    ) -> Result<Forecast, PredictError> {
        let current_price = latest.price();
        if current_price == 0.0 {
            return Err(PredictError::ZeroCurrentPrice {
                market: latest.market_name.clone(),
            });
        }

        let context = MarketContext::fetch(self.store.as_ref(), &latest.market_name)
            .await
            .map_err(PredictError::Store)?;
        let features = build_features(latest, horizon_days, &context, &self.schema);
        let predicted_price = self
            .model
            .predict(&features)
            .await
            .map_err(PredictError::Model)?;

        Ok(Forecast {
            predicted_price,
            prediction_date: shift_days(latest.week_start_date, horizon_days),
            confidence: confidence(horizon_days),
            change_percent: (predicted_price - current_price) / current_price * 100.0,
            trend: Trend::between(current_price, predicted_price),
        })
    }

    /// Cache lookup; an unavailable cache or an undecodable entry is a miss.
    async fn cached(&self, key: &str) -> Option<PredictionResult> {
        let cache = self.cache.as_ref()?;
        match cache.get(key.as_bytes()).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes)
                .inspect_err(|e| warn!("Ignoring undecodable cache entry {}: {}", key, e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Cache unavailable, computing {}: {:#}", key, e);
                None
            }
        }
    }

    async fn remember(&self, key: &str, result: &PredictionResult) {
        let Some(cache) = &self.cache else { return };
        let stored = match serde_json::to_vec(result) {
            Ok(bytes) => cache.put(key.as_bytes(), &bytes, Some(self.cache_ttl)).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            warn!("Failed to cache {}: {:#}", key, e);
        }
    }
}

fn cache_key(market: &str, horizon_days: i64) -> String {
    format!("predict:{market}:{horizon_days}")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::features::FeatureVector;
    use crate::store::memory::{MemoryCollection, MemoryPriceStore};
    use anyhow::{Result, anyhow, bail};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Predicts a fixed price, failing for vectors whose target month is listed.
    pub(crate) struct FixedModel {
        pub price: f64,
        pub failing_months: Vec<f64>,
        pub calls: AtomicUsize,
    }

    impl FixedModel {
        pub fn new(price: f64) -> Self {
            Self {
                price,
                failing_months: vec![],
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceModel for FixedModel {
        async fn predict(&self, features: &FeatureVector) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let month = features.get("month").unwrap_or_default();
            if self.failing_months.contains(&month) {
                bail!("model rejected month {month}");
            }
            Ok(self.price)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl KeyValueCollection for BrokenCache {
        async fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
            Err(anyhow!("connection refused"))
        }

        async fn put(&self, _key: &[u8], _value: &[u8], _ttl: Option<Duration>) -> Result<()> {
            Err(anyhow!("connection refused"))
        }
    }

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn store_with(observations: &[(&str, NaiveDate, i64)]) -> Arc<MemoryPriceStore> {
        Arc::new(
            observations
                .iter()
                .map(|(market, day, price)| {
                    PriceObservation::new(market, *day, Decimal::from(*price))
                })
                .collect(),
        )
    }

    fn predictor(store: Arc<MemoryPriceStore>, model: Arc<FixedModel>) -> Predictor {
        Predictor::new(store, model, Arc::new(FeatureSchema::native()))
    }

    #[tokio::test]
    async fn test_predict_single_observation() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);
        let predictor = predictor(store, Arc::new(FixedModel::new(2100.0)));

        let result = predictor.predict("Agra", 7).await.unwrap();
        assert_eq!(result.market_name, "Agra");
        assert_eq!(result.current_price, 2000.0);
        assert_eq!(result.current_price_date, date(2024, 1, 1));
        assert_eq!(result.prediction_date, date(2024, 1, 8));
        assert_eq!(result.predicted_price, 2100.0);
        assert_eq!(result.horizon_days, 7);
        assert_eq!(result.change_percent, (2100.0 - 2000.0) / 2000.0 * 100.0);
        assert_eq!(result.trend, Trend::Up);
        assert_eq!(result.confidence, confidence(7));
    }

    #[tokio::test]
    async fn test_trend_boundaries() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);

        let equal = predictor(store.clone(), Arc::new(FixedModel::new(2000.0)));
        let result = equal.predict("Agra", 7).await.unwrap();
        assert_eq!(result.trend, Trend::Down);
        assert_eq!(result.change_percent, 0.0);

        let lower = predictor(store, Arc::new(FixedModel::new(1500.0)));
        let result = lower.predict("Agra", 14).await.unwrap();
        assert_eq!(result.trend, Trend::Down);
        assert_eq!(result.change_percent, -25.0);
        assert_eq!(result.prediction_date, date(2024, 1, 15));
    }

    #[tokio::test]
    async fn test_predict_uses_latest_observation() {
        let store = store_with(&[
            ("Agra", date(2024, 1, 1), 2000),
            ("Agra", date(2024, 1, 8), 2400),
            ("Kanpur", date(2024, 2, 5), 1000),
        ]);
        let predictor = predictor(store, Arc::new(FixedModel::new(2100.0)));

        let result = predictor.predict("Agra", 30).await.unwrap();
        assert_eq!(result.current_price, 2400.0);
        assert_eq!(result.prediction_date, date(2024, 2, 7));
        assert_eq!(result.trend, Trend::Down);
    }

    #[tokio::test]
    async fn test_unknown_market_is_not_found() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);
        let predictor = predictor(store, Arc::new(FixedModel::new(2100.0)));

        let err = predictor.predict("Lucknow", 7).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Market not found: Lucknow");
    }

    #[tokio::test]
    async fn test_zero_current_price_is_an_error() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 0)]);
        let model = Arc::new(FixedModel::new(2100.0));
        let predictor = predictor(store, model.clone());

        let err = predictor.predict("Agra", 7).await.unwrap_err();
        assert!(matches!(err, PredictError::ZeroCurrentPrice { .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);
        let mut model = FixedModel::new(2100.0);
        model.failing_months = vec![1.0];
        let predictor = predictor(store, Arc::new(model));

        let err = predictor.predict("Agra", 7).await.unwrap_err();
        assert!(matches!(err, PredictError::Model(_)));
    }

    #[tokio::test]
    async fn test_cache_hit_returns_identical_result() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);
        let model = Arc::new(FixedModel::new(2123.456789));
        let predictor = predictor(store.clone(), model.clone())
            .with_cache(Arc::new(MemoryCollection::new()), DEFAULT_CACHE_TTL);

        let first = predictor.predict("Agra", 7).await.unwrap();
        // Newer data does not affect a cached prediction until it expires.
        store.insert(PriceObservation::new(
            "Agra",
            date(2024, 1, 8),
            Decimal::from(9000),
        ));
        let second = predictor.predict("Agra", 7).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);

        // A different horizon is a different key.
        let other = predictor.predict("Agra", 14).await.unwrap();
        assert_eq!(other.current_price, 9000.0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_expiry_recomputes() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);
        let model = Arc::new(FixedModel::new(2100.0));
        let predictor = predictor(store, model.clone())
            .with_cache(Arc::new(MemoryCollection::new()), Duration::from_millis(10));

        predictor.predict("Agra", 7).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        predictor.predict("Agra", 7).await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_outage_degrades_to_recompute() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);
        let model = Arc::new(FixedModel::new(2100.0));
        let predictor =
            predictor(store, model.clone()).with_cache(Arc::new(BrokenCache), DEFAULT_CACHE_TTL);

        for _ in 0..2 {
            let result = predictor.predict("Agra", 7).await.unwrap();
            assert_eq!(result.predicted_price, 2100.0);
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_undecodable_cache_entry_is_a_miss() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);
        let cache = Arc::new(MemoryCollection::new());
        cache.put(b"predict:Agra:7", b"garbage", None).await.unwrap();
        let predictor = predictor(store, Arc::new(FixedModel::new(2100.0)))
            .with_cache(cache.clone(), DEFAULT_CACHE_TTL);

        let result = predictor.predict("Agra", 7).await.unwrap();
        let stored = cache.get(b"predict:Agra:7").await.unwrap().unwrap();
        let decoded: PredictionResult = serde_json::from_slice(&stored).unwrap();
        assert_eq!(decoded, result);
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_embeds_errors() {
        let store = store_with(&[
            ("Agra", date(2024, 1, 1), 2000),
            ("Kanpur", date(2024, 1, 1), 1000),
        ]);
        let predictor = predictor(store, Arc::new(FixedModel::new(1500.0)));

        let markets = vec![
            "Kanpur".to_string(),
            "Nowhere".to_string(),
            "Agra".to_string(),
        ];
        let entries = predictor.predict_batch(&markets, 7).await;
        assert_eq!(entries.len(), 3);
        let names: Vec<&str> = entries.iter().map(BatchEntry::market_name).collect();
        assert_eq!(names, vec!["Kanpur", "Nowhere", "Agra"]);

        let trends: Vec<Option<Trend>> = entries
            .iter()
            .map(|entry| match entry {
                BatchEntry::Prediction(r) => Some(r.trend),
                BatchEntry::Error { .. } => None,
            })
            .collect();
        assert_eq!(trends, vec![Some(Trend::Up), None, Some(Trend::Down)]);
        match &entries[1] {
            BatchEntry::Error { error, .. } => assert_eq!(error, "Market not found: Nowhere"),
            other => panic!("expected error entry, got {other:?}"),
        }

        let json = serde_json::to_value(&entries[1]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "market_name": "Nowhere", "error": "Market not found: Nowhere" })
        );
    }

    #[tokio::test]
    async fn test_result_serialization() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);
        let predictor = predictor(store, Arc::new(FixedModel::new(2100.0)));

        let result = predictor.predict("Agra", 7).await.unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["trend"], "up");
        assert_eq!(json["current_price_date"], "2024-01-01");
        assert_eq!(json["prediction_date"], "2024-01-08");
    }

    #[tokio::test]
    async fn test_health() {
        let store = store_with(&[
            ("Agra", date(2024, 1, 1), 2000),
            ("Kanpur", date(2024, 1, 1), 1000),
        ]);
        let predictor = predictor(store, Arc::new(FixedModel::new(2100.0)));

        let health = predictor.health().await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.markets, 2);
        assert_eq!(health.model, "fixed");
        assert_eq!(
            health.feature_columns,
            FeatureSchema::native().columns().len()
        );
        assert!(health.model_error.is_none());
    }

    #[tokio::test]
    async fn test_health_reports_failing_model() {
        let store = store_with(&[("Agra", date(2024, 1, 1), 2000)]);
        let model = Arc::new(FixedModel {
            failing_months: vec![0.0],
            ..FixedModel::new(2100.0)
        });
        let predictor = predictor(store, model.clone());

        let health = predictor.health().await.unwrap();
        assert_eq!(health.status, "degraded");
        assert_eq!(health.markets, 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let error = health.model_error.unwrap();
        assert!(error.contains("rejected month 0"), "{error}");

        let json = serde_json::to_value(&predictor.health().await.unwrap()).unwrap();
        assert_eq!(json["status"], "degraded");
        assert!(json["model_error"].is_string());
    }
}
