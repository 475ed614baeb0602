//! Coordinator configuration.
//!
//! Supports a TOML file plus environment variable overrides, matching the
//! teacher's layered `Config::load()` (file, then env, then defaults).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::utils::retry::RetryConfig;

/// Top-level coordinator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Durable log store configuration.
    pub log_store: LogStoreConfig,
    /// Per-call timeout and retry policy for `ExternalCaller`.
    pub external_call: ExternalCallConfig,
    /// Whether to replay the log and resume in-flight sagas on startup.
    pub auto_recover: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_store: LogStoreConfig::default(),
            external_call: ExternalCallConfig::default(),
            auto_recover: true,
        }
    }
}

/// Durable log store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogStoreConfig {
    /// Path to the `sled` database directory.
    pub path: String,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            path: "./data/saga-log".to_string(),
        }
    }
}

/// External-call tuning: per-call timeout and retry/backoff policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExternalCallConfig {
    /// Per-call timeout in seconds before the call counts as failed.
    /// Default: 2s, per `spec.md` §5.
    pub timeout_secs: u64,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
    pub jitter: f64,
}

impl Default for ExternalCallConfig {
    fn default() -> Self {
        let retry = RetryConfig::for_external_calls();
        Self {
            timeout_secs: 2,
            base_delay_ms: retry.base_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
            max_retries: retry.max_retries,
            jitter: retry.jitter,
        }
    }
}

impl ExternalCallConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_retries: self.max_retries,
            jitter: self.jitter,
        }
    }
}

impl Config {
    /// Load configuration from file (if present) and environment.
    ///
    /// Priority (highest to lowest): environment variables, config file,
    /// built-in defaults. The file path is `$SAGA_COORDINATOR_CONFIG`, or
    /// `config.toml` in the working directory if unset.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("SAGA_COORDINATOR_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SAGA_LOG_STORE_PATH") {
            self.log_store.path = path;
        }
        if let Ok(secs) = std::env::var("SAGA_EXTERNAL_CALL_TIMEOUT_SECS") {
            if let Ok(v) = secs.parse() {
                self.external_call.timeout_secs = v;
            }
        }
        if let Ok(max_retries) = std::env::var("SAGA_EXTERNAL_CALL_MAX_RETRIES") {
            if let Ok(v) = max_retries.parse() {
                self.external_call.max_retries = v;
            }
        }
        if let Ok(recover) = std::env::var("SAGA_AUTO_RECOVER") {
            self.auto_recover = recover.to_lowercase() == "true" || recover == "1";
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
