//! CLI configuration
//!
//! ```toml
//! [bridge]
//! request_timeout_ms = 750
//!
//! [demo]
//! plugins = ["ruler", "fog-of-war"]
//! ```

use anyhow::{Context, Result};
use lodestar_bridge::BridgeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub bridge: BridgeConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Plugins mounted by `lodestar demo`
    pub plugins: Vec<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            plugins: vec!["ruler".to_string(), "fog-of-war".to_string()],
        }
    }
}

impl CliConfig {
    /// Load configuration with precedence: defaults < file < env < args
    pub fn load(config_file: Option<PathBuf>, timeout_ms: Option<u64>) -> Result<Self> {
        let mut config = Self::from_file_or_default(config_file)?;

        config.bridge = config
            .bridge
            .with_env_overrides()
            .context("Invalid bridge environment override")?;

        if let Some(timeout_ms) = timeout_ms {
            config.bridge.request_timeout_ms = timeout_ms;
        }
        config.bridge.validate()?;
        Ok(config)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("lodestar").join("config.toml"))
    }

    fn from_file_or_default(config_file: Option<PathBuf>) -> Result<Self> {
        let path = config_file
            .or_else(|| Self::default_config_path().ok())
            .filter(|p| p.exists());

        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Display the current configuration as TOML
    pub fn display_as_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config as TOML")
    }
}
