//! Error types for policy lookups.

use thiserror::Error;

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Errors that can occur while consulting the lock policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The backing store could not be read.
    #[error("policy store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored value had the wrong shape.
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
