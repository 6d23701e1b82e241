use crate::core::features::FeatureVector;
use crate::core::model::PriceModel;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

pub type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Random forest regressor trained with smartcore and saved as JSON.
pub struct SmartcoreModel {
    model: Forest,
    path: PathBuf,
}

impl SmartcoreModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open model file: {}", path.display()))?;
        let raw: serde_json::Value = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to deserialize model: {}", path.display()))?;

        // smartcore accepts a forest without trees and panics on first use.
        let trees = raw
            .pointer("/forest_regressor/trees")
            .and_then(serde_json::Value::as_array)
            .map_or(0, Vec::len);
        if trees == 0 {
            bail!("Model {} holds no fitted trees", path.display());
        }

        let model: Forest = serde_json::from_value(raw)
            .with_context(|| format!("Failed to deserialize model: {}", path.display()))?;
        info!("Loaded model with {} trees from {}", trees, path.display());
        Ok(Self {
            model,
            path: path.to_path_buf(),
        })
    }
}

#[async_trait]
impl PriceModel for SmartcoreModel {
    async fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let input = DenseMatrix::from_2d_vec(&vec![features.values().to_vec()])
            .map_err(|e| anyhow!("Matrix creation failed: {e}"))?;
        let predictions = self
            .model
            .predict(&input)
            .map_err(|e| anyhow!("Prediction failed: {e}"))?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| anyhow!("No prediction returned by {}", self.path.display()))
    }

    fn name(&self) -> &str {
        "smartcore random forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{FeatureSchema, MarketContext, build_features};
    use crate::core::market::PriceObservation;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use smartcore::ensemble::random_forest_regressor::RandomForestRegressorParameters;

    fn train(n_features: usize, target: f64) -> Forest {
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| (0..n_features).map(|j| (i * j) as f64).collect())
            .collect();
        let y = vec![target; x.len()];
        let x = DenseMatrix::from_2d_vec(&x).unwrap();
        RandomForestRegressor::fit(
            &x,
            &y,
            RandomForestRegressorParameters::default().with_n_trees(3),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_load_and_predict() {
        let schema = FeatureSchema::native();
        let file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(file.as_file(), &train(schema.columns().len(), 2500.0)).unwrap();

        let model = SmartcoreModel::load(file.path()).unwrap();
        let latest = PriceObservation::new(
            "Agra",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Decimal::from(2000),
        );
        let features = build_features(&latest, 7, &MarketContext::default(), &schema);
        assert_eq!(model.predict(&features).await.unwrap(), 2500.0);
    }

    #[test]
    fn test_load_invalid_model() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"trees": "nope"}"#).unwrap();
        let err = SmartcoreModel::load(file.path()).err().unwrap();
        assert!(err.to_string().contains("holds no fitted trees"), "{err}");

        std::fs::write(file.path(), r#"{"forest_regressor": {"trees": []}}"#).unwrap();
        let err = SmartcoreModel::load(file.path()).err().unwrap();
        assert!(err.to_string().contains("holds no fitted trees"), "{err}");

        std::fs::write(file.path(), "not json").unwrap();
        let err = SmartcoreModel::load(file.path()).err().unwrap();
        assert!(
            err.to_string().contains("Failed to deserialize model"),
            "{err}"
        );

        let err = SmartcoreModel::load("/nonexistent/model.json").err().unwrap();
        assert!(
            err.to_string().contains("Failed to open model file"),
            "{err}"
        );
    }
}
