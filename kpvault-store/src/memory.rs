//! In-process secret store.
//!
//! Models a single key/value mount. Data operations fail with
//! [`StoreError::MountNotFound`] while the mount is disabled.

use crate::error::{StoreError, StoreResult};
use crate::store::{KvVersion, SecretStore};
use async_trait::async_trait;
use kpvault_types::Payload;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    mounts: BTreeMap<String, KvVersion>,
    secrets: BTreeMap<String, Payload>,
    writes: usize,
    deletes: usize,
}

/// Secret store held in memory, keyed by mount-relative path.
#[derive(Debug)]
pub struct MemoryStore {
    mount: String,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates a store with an empty KV v2 engine mounted at `mount`.
    pub fn new(mount: impl Into<String>) -> Self {
        let mount = mount.into().trim_matches('/').to_string();
        let mut state = MemoryState::default();
        state.mounts.insert(mount.clone(), KvVersion::V2);
        Self {
            mount,
            state: Mutex::new(state),
        }
    }

    /// Returns the mount this store serves secrets from.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Returns a copy of every stored secret.
    pub async fn snapshot(&self) -> BTreeMap<String, Payload> {
        self.state.lock().await.secrets.clone()
    }

    /// Number of successful writes since creation.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Number of successful deletes since creation.
    pub async fn delete_count(&self) -> usize {
        self.state.lock().await.deletes
    }

    /// Returns true if an engine is mounted at `path`.
    pub async fn is_mounted(&self, path: &str) -> bool {
        self.state.lock().await.mounts.contains_key(path.trim_matches('/'))
    }

    fn ensure_mounted(&self, state: &MemoryState) -> StoreResult<()> {
        if state.mounts.contains_key(&self.mount) {
            Ok(())
        } else {
            Err(StoreError::MountNotFound(self.mount.clone()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("secret")
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, path: &str) -> StoreResult<Option<Payload>> {
        let state = self.state.lock().await;
        self.ensure_mounted(&state)?;
        Ok(state.secrets.get(path.trim_matches('/')).cloned())
    }

    async fn write(&self, path: &str, payload: &Payload) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        self.ensure_mounted(&state)?;
        state
            .secrets
            .insert(path.trim_matches('/').to_string(), payload.clone());
        state.writes += 1;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Option<Vec<String>>> {
        let state = self.state.lock().await;
        self.ensure_mounted(&state)?;

        let folder = prefix.trim_matches('/');
        let folder = if folder.is_empty() {
            String::new()
        } else {
            format!("{folder}/")
        };

        let children: BTreeSet<String> = state
            .secrets
            .keys()
            .filter_map(|key| key.strip_prefix(folder.as_str()))
            .filter(|rest| !rest.is_empty())
            .map(|rest| match rest.split_once('/') {
                Some((head, _)) => format!("{head}/"),
                None => rest.to_string(),
            })
            .collect();

        if children.is_empty() {
            Ok(None)
        } else {
            Ok(Some(children.into_iter().collect()))
        }
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        self.ensure_mounted(&state)?;
        if state.secrets.remove(path.trim_matches('/')).is_some() {
            state.deletes += 1;
        }
        Ok(())
    }

    async fn disable_engine(&self, path: &str) -> StoreResult<()> {
        let mount = path.trim_matches('/');
        let mut state = self.state.lock().await;
        if state.mounts.remove(mount).is_none() {
            return Err(StoreError::MountNotFound(mount.to_string()));
        }
        if mount == self.mount {
            state.secrets.clear();
        }
        Ok(())
    }

    async fn enable_engine(&self, path: &str, version: KvVersion) -> StoreResult<()> {
        let mount = path.trim_matches('/');
        let mut state = self.state.lock().await;
        if state.mounts.contains_key(mount) {
            return Err(StoreError::Api {
                status: 400,
                message: format!("path is already in use at {mount}/"),
            });
        }
        state.mounts.insert(mount.to_string(), version);
        Ok(())
    }
}
