//! Common error types for Drive Gallery.

use thiserror::Error;

/// Top-level error type for Drive Gallery operations.
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

    /// Application registration or local setup is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No usable credentials, or the remote rejected them.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The user declined the consent screen.
    #[error("Consent denied: {0}")]
    ConsentDenied(String),

    /// The remote refused access to a resource.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Transport failure or unexpected remote response.
    #[error("Network error: {0}")]
    Network(String),
}

impl Error {
    /// Whether this error means the caller is not (or no longer) authorized.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_) | Error::ConsentDenied(_) | Error::PermissionDenied(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
