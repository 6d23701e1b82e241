use crate::core::features::FeatureVector;
use crate::core::model::PriceModel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Model hosted behind an HTTP inference endpoint.
///
/// Requests are `POST {base_url}/predict` with the columns and values of one
/// feature vector; the endpoint answers with `{"prediction": <price>}`.
pub struct RemoteModel {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    columns: &'a [String],
    features: &'a [f64],
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    prediction: f64,
}

impl RemoteModel {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent("mandi/0.1").build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl PriceModel for RemoteModel {
    async fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let url = format!("{}/predict", self.base_url);
        debug!("Requesting prediction from {}", url);

        let request = PredictRequest {
            columns: features.columns(),
            features: features.values(),
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send prediction request to {url}"))?
            .error_for_status()
            .with_context(|| format!("Model endpoint {url} rejected the request"))?;

        let body = response
            .text()
            .await
            .context("Failed to read prediction response")?;
        let parsed: PredictResponse = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse prediction response: '{body}'"))?;
        Ok(parsed.prediction)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
