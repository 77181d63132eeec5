//! Shared error types for healthbridge.

use thiserror::Error;

/// Result type alias for interop-common operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Common error type shared across the workspace.
///
/// Server-facing HTTP mapping lives in `interop_core::error::AppError`; this
/// type covers the ambient concerns (io, serialization, config, parsing)
/// that every crate in the workspace can hit.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("external service degraded: {0}")]
    Degraded(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
