//! Common error types for classdrive.

use thiserror::Error;

/// Top-level error type for classdrive operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Settings or command-line options are inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A name matched more than one remote resource.
    #[error("Ambiguous name: {0}")]
    Ambiguous(String),

    /// Remote call failed (transport, quota or unexpected status).
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials missing, invalid or expired.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The remote store refused the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
