//! Secret-store clients for kpvault.
//!
//! Provides a single [`SecretStore`] interface covering both the data
//! operations used by the sync engine (read, write, list, delete) and the
//! administrative operations used to reset a secrets engine mount.
//!
//! Two implementations are shipped:
//! - [`VaultClient`]: HashiCorp Vault over HTTP, KV v1 and v2 engines
//! - [`MemoryStore`]: in-process store for tests and dry runs
//!
//! KV engine version differences are handled entirely inside the client;
//! callers only ever see flat [`Payload`](kpvault_types::Payload) values
//! addressed by mount-relative paths.

mod config;
mod error;
mod memory;
mod store;
mod vault;

pub use config::{ClientCert, TlsConfig, TlsVerify, VaultConfig};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{KvVersion, SecretStore};
pub use vault::VaultClient;
