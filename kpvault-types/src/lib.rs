//! Core type definitions for kpvault.
//!
//! This crate defines the normalized, store-agnostic types shared by the
//! source reader, the secret-store client and the sync engine:
//! - Source credential entries and their attachments
//! - Flat key/value payloads and the reserved bookkeeping keys
//! - Resolved store paths
//! - Per-path sync outcomes and field diffs

mod entry;
mod outcome;
mod path;
mod payload;

pub use entry::{Attachment, Entry};
pub use outcome::{FieldDiff, SyncOutcome};
pub use path::ResolvedPath;
pub use payload::{KeyCase, Payload, ReservedKey};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating entries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("entry in group '{group}' has an empty title")]
    EmptyTitle { group: String },

    #[error("unknown sync outcome: {0}")]
    UnknownOutcome(String),
}
