//! Unified error system for the access control core
//!
//! One error enum shared by every crate in the workspace. Decision paths never
//! surface these to callers (they degrade closed); only writes and
//! configuration loading return them.

use serde::{Deserialize, Serialize};

use crate::principal::IdentityKind;

/// Unified error type for all access control operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AccError {
    /// Storage layer unreachable or timed out; transient
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Description of the storage failure
        message: String,
    },

    /// No license record exists for the principal
    #[error("License record missing for '{principal}'")]
    RecordMissing {
        /// Principal the lookup was made for
        principal: String,
    },

    /// A persisted record is missing required fields or cannot be decoded
    #[error("Malformed record at '{key}': {message}")]
    MalformedRecord {
        /// Storage key of the record
        key: String,
        /// What is wrong with it
        message: String,
    },

    /// No principal is attached to the engine
    #[error("No principal is initialized")]
    PrincipalUnknown,

    /// The identity collaborator reported that the session is gone
    #[error("Session expired for {identity_kind} identity")]
    SessionExpired {
        /// Identity provider kind that expired
        identity_kind: IdentityKind,
    },

    /// The acting principal may not perform this operation
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Error message describing the permission issue
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl AccError {
    /// Create a storage unavailable error
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create a record missing error
    pub fn record_missing(principal: impl Into<String>) -> Self {
        Self::RecordMissing {
            principal: principal.into(),
        }
    }

    /// Create a malformed record error
    pub fn malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a session expired error
    pub fn session_expired(identity_kind: IdentityKind) -> Self {
        Self::SessionExpired { identity_kind }
    }

    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Transient failures must never be cached as a positive result.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

/// Standard Result type for access control operations
pub type Result<T> = std::result::Result<T, AccError>;

impl From<serde_json::Error> for AccError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for AccError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::invalid(err.to_string()),
            std::io::ErrorKind::TimedOut => Self::storage_unavailable(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}
