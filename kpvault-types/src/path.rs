//! Resolved store paths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unique store location computed for an entry within one run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedPath(String);

impl ResolvedPath {
    /// Wraps an already-resolved path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the path with a same-run disambiguation suffix appended.
    #[must_use]
    pub fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{} ({n})", self.0))
    }

    /// Consumes the path and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResolvedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ResolvedPath> for String {
    fn from(path: ResolvedPath) -> Self {
        path.0
    }
}
