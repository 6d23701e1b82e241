//! Regression model abstraction

use crate::core::features::FeatureVector;
use anyhow::Result;
use async_trait::async_trait;

/// A trained price regressor. Implementations must be deterministic for a
/// fixed artifact and expect vectors laid out by the loaded feature schema.
#[async_trait]
pub trait PriceModel: Send + Sync {
    async fn predict(&self, features: &FeatureVector) -> Result<f64>;

    fn name(&self) -> &str;
}
