//! Secret store abstraction trait.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use kpvault_types::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Major version of a key/value secrets engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KvVersion {
    #[serde(rename = "1")]
    V1,
    #[default]
    #[serde(rename = "2")]
    V2,
}

impl KvVersion {
    /// Returns the version as sent in mount options.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V2 => "2",
        }
    }
}

impl fmt::Display for KvVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KvVersion {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(['v', 'V']) {
            "1" => Ok(Self::V1),
            "2" => Ok(Self::V2),
            other => Err(StoreError::Protocol(format!("unknown KV version: {other}"))),
        }
    }
}

/// Abstract key/value secret store.
///
/// Paths are relative to the store's configured mount and use `/` as the
/// folder separator. Folder names returned by [`list`](SecretStore::list)
/// carry a trailing `/`.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the name of the store backend.
    fn backend_name(&self) -> &'static str;

    /// Reads the payload at a path. Returns `None` if nothing is stored there.
    async fn read(&self, path: &str) -> StoreResult<Option<Payload>>;

    /// Replaces the payload at a path.
    async fn write(&self, path: &str, payload: &Payload) -> StoreResult<()>;

    /// Lists the immediate children of a folder.
    /// Returns `None` if the folder does not exist.
    async fn list(&self, prefix: &str) -> StoreResult<Option<Vec<String>>>;

    /// Deletes the secret at a path. Deleting a missing path succeeds.
    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// Disables the secrets engine mounted at `path`, discarding its data.
    async fn disable_engine(&self, path: &str) -> StoreResult<()>;

    /// Enables a key/value secrets engine at `path`.
    async fn enable_engine(&self, path: &str, version: KvVersion) -> StoreResult<()>;

    /// Deletes every secret below `prefix`, descending into sub-folders.
    /// Returns the number of secrets deleted; an absent prefix deletes none.
    async fn delete_recursive(&self, prefix: &str) -> StoreResult<usize> {
        let mut pending = vec![prefix.trim_matches('/').to_string()];
        let mut deleted = 0;

        while let Some(folder) = pending.pop() {
            let Some(keys) = self.list(&folder).await? else {
                continue;
            };
            for key in keys {
                let child = if folder.is_empty() {
                    key.trim_end_matches('/').to_string()
                } else {
                    format!("{folder}/{}", key.trim_end_matches('/'))
                };
                if key.ends_with('/') {
                    pending.push(child);
                } else {
                    debug!("Deleting secret: {}", child);
                    self.delete(&child).await?;
                    deleted += 1;
                }
            }
        }

        Ok(deleted)
    }
}
