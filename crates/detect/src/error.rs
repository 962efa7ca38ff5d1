//! Error types for foreground sources.

use thiserror::Error;

/// Result type for foreground source operations.
pub type Result<T> = std::result::Result<T, DetectError>;

/// Errors reported by platform foreground sources.
#[derive(Debug, Error)]
pub enum DetectError {
    /// A required platform permission has not been granted.
    #[error("permission not granted: {0}")]
    PermissionDenied(String),

    /// The window-focus subscription could not be established.
    #[error("failed to subscribe to window events: {0}")]
    SubscriptionFailed(String),

    /// The usage-ranking query failed.
    #[error("usage query failed: {0}")]
    QueryFailed(String),
}
