use crate::config::ConfigError;
use fieldops_cache::CacheError;
use fieldops_client::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("{0}")]
    Cache(#[from] CacheError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Usage(String),
    #[error("Logging setup failed: {0}")]
    Telemetry(String),
}
