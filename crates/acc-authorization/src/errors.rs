//! Error handling for authorization, on the unified `AccError` from acc-core.

pub use acc_core::{AccError, Result};

/// Result of the fallible authorization APIs (privileged writes).
pub type AuthorizationResult<T> = Result<T>;
