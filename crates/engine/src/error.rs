//! Error types for the lock engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced to the host. None of them is fatal to the process.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `grant_unlock` without an app while no flow is presenting.
    #[error("no lock flow is active")]
    NoActiveFlow,

    /// The arbiter task has shut down.
    #[error("lock engine is not running")]
    EngineStopped,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors loading or validating engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}
