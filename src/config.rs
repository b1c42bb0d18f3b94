//! Engine configuration loaded from TOML.
//!
//! ```toml
//! [concurrency]
//! max_retries = 3
//! lock_timeout_ms = 2000
//! retry_backoff_ms = 20
//!
//! [store]
//! busy_timeout_ms = 5000
//! ```
//!
//! Every section and key is optional.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Upper bound on internal retries; no operation may retry indefinitely.
pub const MAX_RETRIES_LIMIT: u32 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub concurrency: ConcurrencySection,
    #[serde(default)]
    pub store: StoreSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConcurrencySection {
    /// Extra attempts after a retryable failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long to wait for a per-class lock before giving up.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_retry_backoff_ms() -> u64 {
    20
}

impl Default for ConcurrencySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            lock_timeout_ms: default_lock_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// SQLite busy handler timeout.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.concurrency.lock_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.concurrency.retry_backoff_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store.busy_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "[concurrency].max_retries must be <= {MAX_RETRIES_LIMIT} (got {})",
                self.concurrency.max_retries
            )));
        }
        if self.concurrency.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "[concurrency].lock_timeout_ms must be >= 1 (got 0)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse and validate configuration from TOML text.
pub fn from_toml_str(contents: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a configuration file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let contents = fs::read_to_string(path.as_ref())?;
    from_toml_str(&contents)
}

/// `ClassEngine.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("ClassEngine.toml")
}
