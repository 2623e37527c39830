//! Flat key/value payloads written to the secret store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// Case rule applied to field keys before they reach the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCase {
    /// Keys are carried through verbatim.
    #[default]
    Preserve,
    /// Keys are lower-cased.
    Lower,
}

impl KeyCase {
    /// Applies the case rule to a key.
    pub fn apply(self, key: &str) -> String {
        match self {
            Self::Preserve => key.to_string(),
            Self::Lower => key.to_lowercase(),
        }
    }
}

/// Bookkeeping keys a source reader may attach to an entry.
/// None of these may ever be written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedKey {
    /// Marker holding the entry name.
    EntryName,
    /// Marker holding the group path.
    Path,
    /// The entry title; it is already encoded in the store path.
    Title,
}

impl ReservedKey {
    /// All reserved keys.
    pub const ALL: [ReservedKey; 3] = [Self::EntryName, Self::Path, Self::Title];

    /// Returns the key as it appears after the given case rule.
    pub fn name(self, case: KeyCase) -> &'static str {
        match (self, case) {
            (Self::EntryName, _) => "_entry_name",
            (Self::Path, _) => "_path",
            (Self::Title, KeyCase::Preserve) => "Title",
            (Self::Title, KeyCase::Lower) => "title",
        }
    }

    /// Returns the reserved key a (case-folded) key collides with, if any.
    pub fn classify(key: &str, case: KeyCase) -> Option<Self> {
        Self::ALL.into_iter().find(|reserved| reserved.name(case) == key)
    }
}

/// Ordered key/value map stored at one path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, String>);

impl Payload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a value, returning the previous one for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Gets the value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates key/value pairs in sorted key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Consumes the payload and returns the underlying map.
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for Payload {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Payload {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
