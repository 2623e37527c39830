//! Fixed in-memory entry list.

use crate::{EntrySource, SourceResult};
use kpvault_types::Entry;

/// Source backed by a pre-built list of entries.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: Vec<Entry>,
}

impl MemorySource {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }
}

impl EntrySource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} entries)", self.entries.len())
    }

    fn entries(&self) -> SourceResult<Vec<Entry>> {
        Ok(self.entries.clone())
    }
}
