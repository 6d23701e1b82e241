pub mod cli;
pub mod core;
pub mod models;
pub mod store;

use crate::cli::Output;
use crate::core::cache::Store;
use crate::core::config::AppConfig;
use crate::core::features::FeatureSchema;
use crate::core::prediction::CACHE_COLLECTION;
use crate::core::{PriceStore, Predictor};
use crate::store::KeyValueStore;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum AppCommand {
    Health,
    Predict { market: String, horizon_days: i64 },
    Markets,
    History { market: String, weeks: usize },
    Batch { markets: Vec<String>, horizon_days: i64 },
    Scenarios { market: String },
    Load { path: PathBuf },
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    output: Output,
) -> Result<()> {
    info!("Mandi price predictor starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.data_path()?;
    let kv_store = KeyValueStore::open(&data_path)?;
    let prices = kv_store.price_store()?;

    if let AppCommand::Load { path } = &command {
        return cli::load::run(path, &prices, output);
    }

    let predictor = build_predictor(&config, &kv_store, Arc::new(prices))?;
    match command {
        AppCommand::Health => cli::markets::run_health(&predictor, output).await,
        AppCommand::Predict {
            market,
            horizon_days,
        } => cli::predict::run(&predictor, &market, horizon_days, output).await,
        AppCommand::Markets => cli::markets::run_markets(&predictor, output).await,
        AppCommand::History { market, weeks } => {
            cli::markets::run_history(&predictor, &market, weeks, output).await
        }
        AppCommand::Batch {
            markets,
            horizon_days,
        } => cli::predict::run_batch(&predictor, &markets, horizon_days, output).await,
        AppCommand::Scenarios { market } => cli::scenarios::run(&predictor, &market, output).await,
        AppCommand::Load { .. } => unreachable!("Load command is handled before model setup"),
    }
}

fn build_predictor(
    config: &AppConfig,
    kv_store: &KeyValueStore,
    prices: Arc<dyn PriceStore>,
) -> Result<Predictor> {
    let schema = match &config.model.schema_path {
        Some(path) => FeatureSchema::load_from_path(path)?,
        None => FeatureSchema::native(),
    };
    let model = models::from_config(&config.model)?;
    info!(
        model = model.name(),
        columns = schema.columns().len(),
        "Loaded model"
    );

    let predictor = Predictor::new(prices, model, Arc::new(schema));
    match kv_store.get_collection(CACHE_COLLECTION, config.cache.persist, true) {
        Some(cache) => Ok(predictor.with_cache(
            cache,
            Duration::from_secs(config.cache.ttl_seconds),
        )),
        None => {
            warn!("Prediction cache unavailable, predictions will not be cached");
            Ok(predictor)
        }
    }
}
