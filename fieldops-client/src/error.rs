//! Error types for backend calls.

use fieldops_core::RecordId;
use thiserror::Error;

/// Failure of a single backend call or subscription.
///
/// Callers above this layer do not branch on the variant; every failure is
/// reported the same way. The variants exist for logs and tests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },

    #[error("No row with id {id} in {table}")]
    NotFound { table: String, id: RecordId },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Realtime(err.to_string())
    }
}

impl From<fieldops_core::RecordDecodeError> for BackendError {
    fn from(err: fieldops_core::RecordDecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}
