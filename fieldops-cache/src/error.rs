//! Cache error taxonomy.

use fieldops_core::RecordId;
use thiserror::Error;

/// A failed cache operation.
///
/// The message is whatever the backend reported. Nothing above this layer
/// tells transient failures apart from permanent ones.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Failed to load {table}: {message}")]
    Load { table: String, message: String },

    #[error("Failed to create record in {table}: {message}")]
    Create { table: String, message: String },

    #[error("Failed to update record {id} in {table}: {message}")]
    Update {
        table: String,
        id: RecordId,
        message: String,
    },

    #[error("Failed to delete record {id} from {table}: {message}")]
    Delete {
        table: String,
        id: RecordId,
        message: String,
    },

    #[error("Failed to subscribe to {table}: {message}")]
    Subscribe { table: String, message: String },
}

impl CacheError {
    pub fn table(&self) -> &str {
        match self {
            CacheError::Load { table, .. }
            | CacheError::Create { table, .. }
            | CacheError::Update { table, .. }
            | CacheError::Delete { table, .. }
            | CacheError::Subscribe { table, .. } => table,
        }
    }

    /// The backend's message, without the operation prefix.
    pub fn message(&self) -> &str {
        match self {
            CacheError::Load { message, .. }
            | CacheError::Create { message, .. }
            | CacheError::Update { message, .. }
            | CacheError::Delete { message, .. }
            | CacheError::Subscribe { message, .. } => message,
        }
    }
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
