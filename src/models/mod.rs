pub mod forest;
pub mod remote;

use crate::core::config::{ModelBackend, ModelConfig};
use crate::core::model::PriceModel;
use anyhow::Result;
use std::sync::Arc;

/// Instantiates the backend selected in the configuration.
pub fn from_config(config: &ModelConfig) -> Result<Arc<dyn PriceModel>> {
    Ok(match config.backend()? {
        ModelBackend::Smartcore(path) => Arc::new(forest::SmartcoreModel::load(path)?),
        ModelBackend::Remote(base_url) => Arc::new(remote::RemoteModel::new(&base_url)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{RemoteModelConfig, SmartcoreModelConfig};

    #[test]
    fn test_missing_forest_file_fails() {
        let config = ModelConfig {
            schema_path: None,
            smartcore: Some(SmartcoreModelConfig {
                path: "/nonexistent/forest.json".to_string(),
            }),
            remote: None,
        };
        let err = from_config(&config).err().unwrap();
        assert!(err.to_string().contains("Failed to open model file"));
    }

    #[test]
    fn test_remote_backend_is_selected() {
        let config = ModelConfig {
            schema_path: None,
            smartcore: None,
            remote: Some(RemoteModelConfig {
                base_url: "http://localhost:8080/".to_string(),
            }),
        };
        let model = from_config(&config).unwrap();
        assert_eq!(model.name(), "remote");
    }
}
