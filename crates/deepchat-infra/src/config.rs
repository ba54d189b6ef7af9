//! Configuration loader for DeepChat.
//!
//! Reads `config.toml` from the data directory (`~/.deepchat/` by default,
//! overridden by `DEEPCHAT_DATA_DIR`) and deserializes it into
//! [`DeepChatConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::{Path, PathBuf};

use deepchat_types::config::DeepChatConfig;

use crate::sqlite::pool::default_database_url;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "DEEPCHAT_DATA_DIR";

/// Name of the config file inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory: `DEEPCHAT_DATA_DIR`, else `~/.deepchat`.
pub fn resolve_data_dir() -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".deepchat"),
    }
}

/// Load configuration from `{data_dir}/config.toml`.
pub async fn load_config(data_dir: &Path) -> DeepChatConfig {
    load_config_file(&data_dir.join(CONFIG_FILE)).await
}

/// Load configuration from an explicit path.
///
/// - If the file does not exist, returns [`DeepChatConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
pub async fn load_config_file(config_path: &Path) -> DeepChatConfig {
    let content = match tokio::fs::read_to_string(config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", config_path.display());
            return DeepChatConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return DeepChatConfig::default();
        }
    };

    match toml::from_str::<DeepChatConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            DeepChatConfig::default()
        }
    }
}

/// SQLite URL: configured value, else `{data_dir}/deepchat.db`.
pub fn database_url(config: &DeepChatConfig, data_dir: &Path) -> String {
    config
        .database_url
        .clone()
        .unwrap_or_else(|| default_database_url(data_dir))
}

/// Frozen model directory: configured value, else `{data_dir}/models`.
pub fn models_dir(config: &DeepChatConfig, data_dir: &Path) -> PathBuf {
    config
        .models_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("models"))
}
