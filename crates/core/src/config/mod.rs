//! Session configuration
//!
//! A small TOML file controls which reload steps run and how verbose the
//! log output is. Missing fields take their defaults, so an empty file is a
//! valid config.
//!
//! # Example
//!
//! ```ignore
//! use relive_core::config::{config_path, LiveConfig};
//!
//! let config = LiveConfig::load(&config_path()).unwrap_or_default();
//! relive_core::logging::init(&config);
//! ```

mod loader;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use loader::{config_path, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Reload session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Explicit `tracing` filter directive, overrides `debug`
    pub log_filter: Option<String>,

    /// Redirect superseded functions on reload
    pub hook_functions: bool,

    /// Retarget new code to persistent variables on reload
    pub relocate_variables: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            log_filter: None,
            hook_functions: true,
            relocate_variables: true,
        }
    }
}

impl LiveConfig {
    /// Load config from `path`, creating a default file if missing
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml_str(&content)?;
            tracing::debug!("Loaded config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save(path)?;
            tracing::info!("Created default config at {:?}", path);
            Ok(default)
        }
    }

    /// Save config to `path`
    ///
    /// Creates parent directories if they don't exist.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reload config from `path`, replacing self
    pub fn reload(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = Self::from_toml_str(&content)?;
        tracing::debug!("Reloaded config from {:?}", path);
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn log_filter(&self) -> &str {
        match &self.log_filter {
            Some(filter) => filter,
            None if self.debug => "debug",
            None => "info",
        }
    }
}
