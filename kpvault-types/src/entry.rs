//! Normalized in-memory representation of one source credential.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A binary attachment carried by an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name as stored in the source database.
    pub filename: String,
    /// Raw content.
    pub content: Vec<u8>,
}

impl Attachment {
    /// Creates a new attachment.
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// One credential record read from the source database.
///
/// Entries are read-only once produced by a source reader. Attachment order
/// is significant: it determines the index prefix of each attachment key in
/// the resulting payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry title. Must be non-empty to be importable; whitespace is kept.
    pub title: String,
    /// Owning group names from the top-level group downwards.
    /// Empty for entries stored in the root group.
    pub group_path: Vec<String>,
    /// Standard and custom string fields.
    pub fields: BTreeMap<String, String>,
    /// Binary attachments in source order.
    pub attachments: Vec<Attachment>,
}

impl Entry {
    /// Creates an entry with no fields or attachments.
    pub fn new<I, S>(title: impl Into<String>, group_path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            group_path: group_path.into_iter().map(Into::into).collect(),
            fields: BTreeMap::new(),
            attachments: Vec::new(),
        }
    }

    /// Adds a string field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Appends an attachment.
    #[must_use]
    pub fn with_attachment(mut self, filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.attachments.push(Attachment::new(filename, content));
        self
    }

    /// Returns true if the entry lives directly in the root group.
    pub fn is_root(&self) -> bool {
        self.group_path.is_empty()
    }

    /// Returns the group path joined with `/`, empty for the root group.
    pub fn group(&self) -> String {
        self.group_path.join("/")
    }

    /// Rejects entries that cannot be given a store path.
    pub fn validate(&self) -> crate::Result<()> {
        if self.title.is_empty() {
            return Err(crate::Error::EmptyTitle { group: self.group() });
        }
        Ok(())
    }
}
