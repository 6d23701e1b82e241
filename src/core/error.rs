use thiserror::Error;

/// Failures of the prediction pipeline.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The market has no observation with a price.
    #[error("Market not found: {0}")]
    MarketNotFound(String),

    /// The latest price is zero, so a relative change cannot be expressed.
    #[error("Current price for {market} is zero; change percent is undefined")]
    ZeroCurrentPrice { market: String },

    #[error("Price store error: {0:#}")]
    Store(anyhow::Error),

    #[error("Model inference failed: {0:#}")]
    Model(anyhow::Error),
}

impl PredictError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PredictError::MarketNotFound(_))
    }
}
