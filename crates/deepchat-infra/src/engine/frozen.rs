//! Frozen model loader.
//!
//! Each frozen model lives in `{models_dir}/{data_name}/` and is described by
//! an `engine.toml` serving descriptor:
//!
//! ```toml
//! endpoint = "http://127.0.0.1:8501/respond"
//! timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use deepchat_core::engine::{BoxEngine, EngineLoader};
use deepchat_types::config::MIN_TIMEOUT_SECS;
use deepchat_types::error::EngineError;

use super::http::HttpEngine;

/// Descriptor file name inside each model directory.
pub const DESCRIPTOR_FILE: &str = "engine.toml";

/// Serving descriptor of one frozen model.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineDescriptor {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl EngineDescriptor {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(MIN_TIMEOUT_SECS))
    }
}

/// Loads frozen models from a directory of descriptors.
pub struct FrozenModelLoader {
    models_dir: PathBuf,
    client: reqwest::Client,
}

impl FrozenModelLoader {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path of the descriptor for `data_name`, after validating the name.
    ///
    /// Only ASCII letters, digits, `_` and `-` are accepted so a data name can
    /// never escape `models_dir`.
    pub fn descriptor_path(&self, data_name: &str) -> Result<PathBuf, EngineError> {
        let valid = !data_name.is_empty()
            && data_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(EngineError::load(data_name, "invalid data name"));
        }
        Ok(self.models_dir.join(data_name).join(DESCRIPTOR_FILE))
    }

    /// Read and parse the descriptor for `data_name`.
    pub async fn read_descriptor(&self, data_name: &str) -> Result<EngineDescriptor, EngineError> {
        let path = self.descriptor_path(data_name)?;

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::load(data_name, format!("no frozen model at {}", path.display()))
            } else {
                EngineError::load(data_name, format!("failed to read {}: {e}", path.display()))
            }
        })?;

        toml::from_str::<EngineDescriptor>(&content).map_err(|e| {
            EngineError::load(data_name, format!("invalid {}: {e}", path.display()))
        })
    }
}

impl EngineLoader for FrozenModelLoader {
    async fn load(&self, identity: &str) -> Result<BoxEngine, EngineError> {
        let descriptor = self.read_descriptor(identity).await?;
        let endpoint = reqwest::Url::parse(&descriptor.endpoint).map_err(|e| {
            EngineError::load(identity, format!("invalid endpoint '{}': {e}", descriptor.endpoint))
        })?;

        info!(identity, endpoint = %endpoint, "loaded frozen model");
        Ok(BoxEngine::new(HttpEngine::new(
            identity,
            self.client.clone(),
            endpoint,
            descriptor.timeout(),
        )))
    }
}
