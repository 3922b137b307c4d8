//! Storage errors

use acc_core::AccError;
use serde::{Deserialize, Serialize};

/// Failure reported by a keyspace handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StorageError {
    /// Backend cannot be reached
    #[error("Storage backend unavailable: {message}")]
    Unavailable {
        /// What went wrong
        message: String,
    },
    /// Operation exceeded its deadline
    #[error("Storage operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation name
        operation: String,
        /// Deadline that elapsed
        timeout_ms: u64,
    },
    /// Any other backend failure
    #[error("Storage backend error: {message}")]
    Backend {
        /// What went wrong
        message: String,
    },
}

impl StorageError {
    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

impl From<StorageError> for AccError {
    fn from(err: StorageError) -> Self {
        AccError::storage_unavailable(err.to_string())
    }
}
