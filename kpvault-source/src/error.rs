//! Error types for credential sources.

use thiserror::Error;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur reading a credential database.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Wrong credentials or a corrupt database file.
    #[error("database error: {0}")]
    Database(String),

    /// The database or key file could not be read.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
