//! Error types for the secret-store layer.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur talking to a secret store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected the token (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Certificate material could not be loaded or the handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The store could not be reached or timed out.
    #[error("store unreachable: {0}")]
    Connectivity(String),

    /// No secrets engine is mounted at the path.
    #[error("no matching mount: {0}")]
    MountNotFound(String),

    /// Any other non-success response.
    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for the "mount not found" administrative condition.
    pub fn is_mount_not_found(&self) -> bool {
        matches!(self, Self::MountNotFound(_))
    }
}
