//! Core business logic: market data, feature derivation and prediction

pub mod cache;
pub mod confidence;
pub mod config;
pub mod error;
pub mod features;
pub mod log;
pub mod market;
pub mod model;
pub mod prediction;
pub mod scenario;

// Re-export main types for cleaner imports
pub use error::PredictError;
pub use market::{MarketStats, PriceObservation, PriceStore};
pub use model::PriceModel;
pub use prediction::{BatchEntry, PredictionResult, Predictor, Trend};
pub use scenario::ScenarioReport;
