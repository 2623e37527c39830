//! Per-path sync outcomes and field-level diffs.

use crate::Payload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Classification of one entry against the store's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Nothing stored at the path yet.
    New,
    /// Stored value equals the candidate.
    Ok,
    /// Stored value differs from the candidate.
    Changed,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Ok => "ok",
            Self::Changed => "changed",
        }
    }

    /// Returns true if the candidate has to be written.
    pub fn needs_write(self) -> bool {
        !matches!(self, Self::Ok)
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOutcome {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "ok" => Ok(Self::Ok),
            "changed" => Ok(Self::Changed),
            other => Err(crate::Error::UnknownOutcome(other.to_string())),
        }
    }
}

/// Key-level difference between a stored payload and a candidate.
///
/// Keys present on both sides with identical values appear in none of the
/// sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Keys only in the candidate.
    pub added: BTreeSet<String>,
    /// Keys only in the stored payload.
    pub removed: BTreeSet<String>,
    /// Keys on both sides with differing values.
    pub changed: BTreeSet<String>,
}

impl FieldDiff {
    /// Computes the diff from `old` to `new`.
    pub fn between(old: &Payload, new: &Payload) -> Self {
        let mut diff = Self::default();
        for (key, value) in new {
            match old.get(key) {
                None => {
                    diff.added.insert(key.clone());
                }
                Some(previous) if previous != value => {
                    diff.changed.insert(key.clone());
                }
                Some(_) => {}
            }
        }
        diff.removed = old
            .keys()
            .filter(|key| !new.contains_key(key))
            .map(str::to_string)
            .collect();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
