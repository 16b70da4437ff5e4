//! Bridge configuration
//!
//! Loaded from TOML, with environment overrides applied on top.
//!
//! ```toml
//! request_timeout_ms = 750
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding [`BridgeConfig::request_timeout_ms`].
pub const ENV_REQUEST_TIMEOUT_MS: &str = "LODESTAR_REQUEST_TIMEOUT_MS";

/// Default time a request waits for its correlated response.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How long a request waits for its response before failing
    pub request_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl BridgeConfig {
    /// Set the request timeout. Sub-millisecond remainders round up, so any
    /// non-zero duration stays non-zero.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        let mut millis = timeout.as_millis();
        if timeout.subsec_nanos() % 1_000_000 != 0 {
            millis += 1;
        }
        self.request_timeout_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_REQUEST_TIMEOUT_MS} must be an integer, got {raw:?}"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
