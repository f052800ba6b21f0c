//! Hierarchical configuration loading.
//!
//! Precedence, lowest first: built-in defaults, `tunesmith.yaml` in the
//! working directory, then `TUNESMITH_*` environment variables (nested keys
//! split on `__`, e.g. `TUNESMITH_SERVER__BASE_URL`).

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::services::history_store::DEFAULT_MAX_ENTRIES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Inference server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_key: None,
            timeout_secs: 300,
        }
    }
}

/// History persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub database_url: String,
    pub fallback_path: String,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:tunesmith.db".to_string(),
            fallback_path: "tunesmith-history.json".to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub history: HistoryConfig,
    /// Model loaded for sweeps.
    pub model_id: String,
    /// Existing session id used by sampling-mode runs and the template probe.
    pub session_id: Option<String>,
    /// Context window of the active session, when known.
    pub context_window: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            history: HistoryConfig::default(),
            model_id: String::new(),
            session_id: None,
            context_window: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, the given YAML file, and
    /// `TUNESMITH_`-prefixed environment variables, in that order.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("TUNESMITH_").split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        debug!(base_url = %config.server.base_url, "configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server.base_url is empty".to_string()));
        }
        if self.server.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.timeout_secs must be positive".to_string(),
            ));
        }
        if self.history.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "history.max_entries must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history.max_entries, DEFAULT_MAX_ENTRIES);
    }

    #[test]
    fn yaml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  base_url: http://gpu-box:9000\nmodel_id: llama-3.1-8b"
        )
        .unwrap();
        let config = Config::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.base_url, "http://gpu-box:9000");
        assert_eq!(config.model_id, "llama-3.1-8b");
        // Untouched sections keep their defaults.
        assert_eq!(config.server.timeout_secs, 300);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  timeout_secs: 0").unwrap();
        let err = Config::load_from(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
