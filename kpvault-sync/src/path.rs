//! Store path resolution.
//!
//! The base path of an entry is `prefix + group/…/group + "/" + title`, or
//! `prefix + title` for root entries. Empty segments are dropped, so a title
//! like `x/` or an unnamed group keys the same secret the store would.
//! Within one run the first entry to claim a base path keeps it; every later
//! entry resolving to the same base path gets the next free ` (n)` suffix,
//! n starting at 1.

use kpvault_types::{Entry, Error, ResolvedPath};
use std::collections::{HashMap, HashSet};
use std::iter;
use tracing::info;

/// Maps entries to unique store paths under a prefix.
#[derive(Debug, Clone)]
pub struct PathResolver {
    prefix: String,
}

impl PathResolver {
    /// Creates a resolver. A non-empty prefix is normalized to end in `/`
    /// and to have no leading `/`.
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim_start_matches('/');
        let prefix = if trimmed.is_empty() || trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        Self { prefix }
    }

    /// Returns the normalized prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Computes the base path of a single entry, without disambiguation.
    pub fn base_path(&self, entry: &Entry) -> kpvault_types::Result<ResolvedPath> {
        entry.validate()?;
        let segments = iter::once(self.prefix.as_str())
            .chain(entry.group_path.iter().map(String::as_str))
            .chain(iter::once(entry.title.as_str()));
        let path = join_segments(segments);
        if path.is_empty() {
            return Err(Error::EmptyTitle { group: entry.group() });
        }
        Ok(ResolvedPath::new(path))
    }

    /// Resolves every entry, in order, to a path no other entry in the
    /// slice shares. Fails on the first entry with an empty title.
    pub fn resolve(&self, entries: &[Entry]) -> kpvault_types::Result<Vec<ResolvedPath>> {
        let mut assigned: HashSet<ResolvedPath> = HashSet::with_capacity(entries.len());
        let mut suffixes: HashMap<ResolvedPath, usize> = HashMap::new();
        let mut resolved = Vec::with_capacity(entries.len());

        for entry in entries {
            let base = self.base_path(entry)?;

            let path = if assigned.contains(&base) {
                // A literal title such as "x (1)" may already hold the next
                // suffix; skip over anything taken.
                let counter = suffixes.entry(base.clone()).or_insert(0);
                let mut candidate;
                loop {
                    *counter += 1;
                    candidate = base.with_suffix(*counter);
                    if !assigned.contains(&candidate) {
                        break;
                    }
                }
                info!("Entry '{}' collides with an earlier entry, using '{}'", base, candidate);
                candidate
            } else {
                base
            };

            assigned.insert(path.clone());
            resolved.push(path);
        }

        Ok(resolved)
    }
}

/// Joins the non-empty `/`-separated segments of every part.
fn join_segments<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new("")
    }
}
