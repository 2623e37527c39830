//! Error types for the sync engine.

use kpvault_source::SourceError;
use kpvault_store::StoreError;
use thiserror::Error;

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Errors that abort an import run.
#[derive(Debug, Error)]
pub enum ImportError {
    /// An entry cannot be imported (e.g. empty title).
    #[error("invalid entry: {0}")]
    Validation(#[from] kpvault_types::Error),

    /// The source database could not be read.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// A store operation failed.
    #[error("{operation} failed for '{path}': {source}")]
    Store {
        operation: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },

    /// A blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

impl ImportError {
    pub(crate) fn store(operation: &'static str, path: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Returns the underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}
