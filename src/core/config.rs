use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmartcoreModelConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemoteModelConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    /// JSON array of the model's input columns; the builder's native layout
    /// is used when absent.
    pub schema_path: Option<String>,
    pub smartcore: Option<SmartcoreModelConfig>,
    pub remote: Option<RemoteModelConfig>,
}

/// The model backend selected by a `ModelConfig`.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelBackend {
    Smartcore(PathBuf),
    Remote(String),
}

impl ModelConfig {
    pub fn backend(&self) -> Result<ModelBackend> {
        match (&self.smartcore, &self.remote) {
            (Some(local), None) => Ok(ModelBackend::Smartcore(PathBuf::from(&local.path))),
            (None, Some(remote)) => Ok(ModelBackend::Remote(remote.base_url.clone())),
            (Some(_), Some(_)) => bail!("Configure exactly one model backend, found both"),
            (None, None) => bail!("No model backend configured"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "CacheConfig::default_persist")]
    pub persist: bool,
}

impl CacheConfig {
    fn default_ttl_seconds() -> u64 {
        3600
    }

    fn default_persist() -> bool {
        true
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_seconds: Self::default_ttl_seconds(),
            persist: Self::default_persist(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "mandi", "mandi")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "mandi", "mandi")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
