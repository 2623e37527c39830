//! Connection settings for a Vault server.

use crate::store::KvVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Server certificate verification mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsVerify {
    /// Verify against the platform trust roots.
    #[default]
    Enabled,
    /// Accept any server certificate.
    Disabled,
    /// Verify against the certificates in a PEM bundle.
    CaBundle(PathBuf),
}

/// Client certificate pair for mutual TLS (PEM files).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCert {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// TLS settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub verify: TlsVerify,
    pub client_cert: Option<ClientCert>,
}

/// Vault client configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Base URL of the server (e.g. `https://localhost:8200`).
    pub url: String,
    /// Token sent with every request.
    pub token: String,
    /// Mount point of the key/value secrets engine.
    pub mount: String,
    /// Engine version; detected from the server when unset.
    pub kv_version: Option<KvVersion>,
    /// TLS settings.
    #[serde(default)]
    pub tls: TlsConfig,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:8200".to_string(),
            token: String::new(),
            mount: "secret".to_string(),
            kv_version: None,
            tls: TlsConfig::default(),
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("mount", &self.mount)
            .field("kv_version", &self.kv_version)
            .field("tls", &self.tls)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
