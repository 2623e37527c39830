//! Credential sources for kpvault.
//!
//! A source yields the full, ordered list of [`Entry`] values for one
//! import run. The order is the database's natural document order and is
//! significant: same-run path collisions are numbered in that order.

mod error;
mod kdbx;
mod memory;

pub use error::{SourceError, SourceResult};
pub use kdbx::{KdbxSource, normalize_field_name};
pub use memory::MemorySource;

use kpvault_types::Entry;

/// Something that can produce credential entries.
pub trait EntrySource: Send + Sync {
    /// Human-readable description of the source, for logging.
    fn describe(&self) -> String;

    /// Reads every entry in source order.
    fn entries(&self) -> SourceResult<Vec<Entry>>;
}
