//! Configuration types for DeepChat.
//!
//! `DeepChatConfig` represents `config.toml` in the data directory. Every
//! field has a default so an empty (or missing) file is a valid config.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entity::ConversationKeying;

/// Timeouts are clamped to at least this many seconds.
pub const MIN_TIMEOUT_SECS: u64 = 1;

/// Which entity store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("invalid storage backend: '{other}'")),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepChatConfig {
    /// Test configuration: every request is served by the fixed
    /// "Reverse TestBot" engine and no model is ever loaded.
    #[serde(default)]
    pub testing: bool,

    #[serde(default)]
    pub storage: StorageBackend,

    /// SQLite URL. Defaults to `{data_dir}/deepchat.db`.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Directory holding one sub-directory per frozen model.
    /// Defaults to `{data_dir}/models`.
    #[serde(default)]
    pub models_dir: Option<PathBuf>,

    #[serde(default)]
    pub conversation_keying: ConversationKeying,

    #[serde(default = "default_engine_load_timeout_secs")]
    pub engine_load_timeout_secs: u64,

    #[serde(default = "default_commit_timeout_secs")]
    pub commit_timeout_secs: u64,

    /// Session identity used when the client never supplied a name.
    #[serde(default = "default_user")]
    pub default_user: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// HTTP sessions unused for this long are dropped.
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,

    /// Most HTTP sessions held at once.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Bridge tracing spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_engine_load_timeout_secs() -> u64 {
    30
}

fn default_commit_timeout_secs() -> u64 {
    10
}

fn default_user() -> String {
    "Anon".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_session_idle_timeout_secs() -> u64 {
    3600
}

fn default_max_sessions() -> usize {
    10_000
}

impl DeepChatConfig {
    pub fn engine_load_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_load_timeout_secs.max(MIN_TIMEOUT_SECS))
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_secs(self.commit_timeout_secs.max(MIN_TIMEOUT_SECS))
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs.max(MIN_TIMEOUT_SECS))
    }
}

impl Default for DeepChatConfig {
    fn default() -> Self {
        Self {
            testing: false,
            storage: StorageBackend::default(),
            database_url: None,
            models_dir: None,
            conversation_keying: ConversationKeying::default(),
            engine_load_timeout_secs: default_engine_load_timeout_secs(),
            commit_timeout_secs: default_commit_timeout_secs(),
            default_user: default_user(),
            bind_addr: default_bind_addr(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
            max_sessions: default_max_sessions(),
            otel: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = DeepChatConfig::default();
        assert!(!config.testing);
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.conversation_keying, ConversationKeying::Composite);
        assert_eq!(config.default_user, "Anon");
        assert_eq!(config.engine_load_timeout(), Duration::from_secs(30));
        assert_eq!(config.commit_timeout(), Duration::from_secs(10));
        assert_eq!(config.session_idle_timeout(), Duration::from_secs(3600));
        assert_eq!(config.max_sessions, 10_000);
    }

    #[test]
    fn test_config_deserialize_empty_uses_defaults() {
        let config: DeepChatConfig = toml::from_str("").unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:5000");
        assert!(config.database_url.is_none());
        assert!(config.models_dir.is_none());
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
testing = true
storage = "memory"
conversation_keying = "marker"
models_dir = "/srv/models"
engine_load_timeout_secs = 5
default_user = "Guest"
session_idle_timeout_secs = 600
max_sessions = 250
"#;
        let config: DeepChatConfig = toml::from_str(toml_str).unwrap();
        assert!(config.testing);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.conversation_keying, ConversationKeying::Marker);
        assert_eq!(config.models_dir, Some(PathBuf::from("/srv/models")));
        assert_eq!(config.engine_load_timeout(), Duration::from_secs(5));
        assert_eq!(config.default_user, "Guest");
        assert_eq!(config.session_idle_timeout(), Duration::from_secs(600));
        assert_eq!(config.max_sessions, 250);
    }

    #[test]
    fn test_timeouts_have_floor() {
        let config = DeepChatConfig {
            engine_load_timeout_secs: 0,
            commit_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.engine_load_timeout(), Duration::from_secs(MIN_TIMEOUT_SECS));
        assert_eq!(config.commit_timeout(), Duration::from_secs(MIN_TIMEOUT_SECS));
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!("Memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("postgres".parse::<StorageBackend>().is_err());
    }
}
