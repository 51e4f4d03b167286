//! Configuration loading for the FieldOps CLI.
//!
//! All fields are required unless explicitly marked optional. No defaults,
//! except for `--memory` runs without a config file.

use fieldops_cache::CacheOptions;
use fieldops_client::ClientConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_format: LogFormat,
    /// Remote backend. Required unless running with `--memory`.
    pub backend: Option<ClientConfig>,
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    pub echo_window_ms: u64,
    pub announce_remote_changes: bool,
    pub success_notifications: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or FIELDOPS_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error(transparent)]
    Client(#[from] fieldops_client::ConfigError),
}

impl CliConfig {
    /// Load and validate the config at `path`.
    ///
    /// Without a path, `--memory` runs fall back to [`CliConfig::offline`].
    pub fn load(path: Option<&Path>, memory: bool) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_path(path)?,
            None if memory => Self::offline(),
            None => return Err(ConfigError::MissingConfigPath),
        };
        config.validate(memory)?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Settings for an in-memory demo run.
    pub fn offline() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            backend: None,
            cache: CacheSection {
                echo_window_ms: 30_000,
                announce_remote_changes: true,
                success_notifications: true,
            },
        }
    }

    pub fn validate(&self, memory: bool) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_level",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache.echo_window_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.echo_window_ms",
                reason: "must be > 0".to_string(),
            });
        }
        match &self.backend {
            Some(backend) => backend.validate()?,
            None if memory => {}
            None => {
                return Err(ConfigError::InvalidValue {
                    field: "backend",
                    reason: "required unless --memory is set".to_string(),
                })
            }
        }
        Ok(())
    }
}

impl CacheSection {
    pub fn to_options(&self) -> CacheOptions {
        CacheOptions {
            echo_window: Duration::from_millis(self.echo_window_ms),
            announce_remote_changes: self.announce_remote_changes,
            success_notifications: self.success_notifications,
        }
    }
}
