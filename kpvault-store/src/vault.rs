//! HashiCorp Vault storage implementation.
//!
//! Talks to the Vault HTTP API directly: KV v1 and v2 data endpoints for
//! secrets and `sys/mounts` for engine administration.

use crate::config::{TlsVerify, VaultConfig};
use crate::error::{StoreError, StoreResult};
use crate::store::{KvVersion, SecretStore};
use async_trait::async_trait;
use kpvault_types::Payload;
use reqwest::{Certificate, Client, Identity, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Vault API response structures.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KvV2Data {
    data: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MountInfo {
    #[serde(default)]
    options: Option<MountOptions>,
}

#[derive(Debug, Deserialize)]
struct MountOptions {
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault key/value store client.
pub struct VaultClient {
    config: VaultConfig,
    client: Client,
    detected_version: Arc<RwLock<Option<KvVersion>>>,
}

impl VaultClient {
    /// Creates a new client. Fails if TLS material cannot be loaded.
    pub fn new(config: VaultConfig) -> StoreResult<Self> {
        let client = build_http_client(&config)?;
        Ok(Self {
            config,
            client,
            detected_version: Arc::new(RwLock::new(None)),
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Returns the KV engine version in use for the configured mount,
    /// querying the server on first use when not configured explicitly.
    pub async fn kv_version(&self) -> StoreResult<KvVersion> {
        if let Some(version) = self.config.kv_version {
            return Ok(version);
        }
        if let Some(version) = *self.detected_version.read().await {
            return Ok(version);
        }

        let detected = self.detect_kv_version().await?;
        *self.detected_version.write().await = Some(detected);
        Ok(detected)
    }

    async fn detect_kv_version(&self) -> StoreResult<KvVersion> {
        let url = self.api_url(&format!("sys/internal/ui/mounts/{}", encode_path(&self.config.mount)));
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| transport_error("mount lookup", e))?;

        // Tokens without capabilities on the UI mounts endpoint get 403 here;
        // a rejected token still fails on the data request that follows.
        if !response.status().is_success() {
            debug!(
                "Mount lookup for '{}' returned {}, assuming KV v2",
                self.config.mount,
                response.status()
            );
            return Ok(KvVersion::V2);
        }

        let mount: Envelope<MountInfo> = parse_json(response).await?;
        let version = mount
            .data
            .and_then(|info| info.options)
            .and_then(|options| options.version);
        let version = match version.as_deref() {
            Some("2") => KvVersion::V2,
            _ => KvVersion::V1,
        };

        debug!("Mount '{}' is KV v{}", self.config.mount, version);
        Ok(version)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    /// Builds the URL of a secret. `v2_segment` is `data` or `metadata`.
    fn secret_url(&self, version: KvVersion, path: &str, v2_segment: &str) -> String {
        let mount = encode_path(&self.config.mount);
        let path = encode_path(path);
        match version {
            KvVersion::V1 => self.api_url(&format!("{mount}/{path}")),
            KvVersion::V2 => self.api_url(&format!("{mount}/{v2_segment}/{path}")),
        }
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(TOKEN_HEADER, &self.config.token)
    }

    fn is_own_mount(&self, path: &str) -> bool {
        path.trim_matches('/') == self.config.mount.trim_matches('/')
    }
}

#[async_trait]
impl SecretStore for VaultClient {
    fn backend_name(&self) -> &'static str {
        "Vault"
    }

    async fn read(&self, path: &str) -> StoreResult<Option<Payload>> {
        let version = self.kv_version().await?;
        debug!("Reading secret: {}", path);

        let response = self
            .request(Method::GET, self.secret_url(version, path, "data"))
            .send()
            .await
            .map_err(|e| transport_error("read", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;

        let data = match version {
            KvVersion::V1 => {
                let body: Envelope<serde_json::Map<String, serde_json::Value>> =
                    parse_json(response).await?;
                body.data
            }
            KvVersion::V2 => {
                let body: Envelope<KvV2Data> = parse_json(response).await?;
                body.data.and_then(|d| d.data)
            }
        };

        Ok(data.map(into_payload))
    }

    async fn write(&self, path: &str, payload: &Payload) -> StoreResult<()> {
        let version = self.kv_version().await?;
        debug!("Writing secret: {} ({} keys)", path, payload.len());

        let body = match version {
            KvVersion::V1 => serde_json::to_value(payload)?,
            KvVersion::V2 => serde_json::json!({ "data": payload }),
        };

        let response = self
            .request(Method::POST, self.secret_url(version, path, "data"))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("write", e))?;

        check_status(response).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Option<Vec<String>>> {
        let version = self.kv_version().await?;
        debug!("Listing folder: {}", prefix);

        let response = self
            .request(Method::GET, self.secret_url(version, prefix.trim_matches('/'), "metadata"))
            .query(&[("list", "true")])
            .send()
            .await
            .map_err(|e| transport_error("list", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;

        let body: Envelope<ListData> = parse_json(response).await?;
        Ok(body.data.map(|d| d.keys))
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let version = self.kv_version().await?;
        debug!("Deleting secret: {}", path);

        let response = self
            .request(Method::DELETE, self.secret_url(version, path, "metadata"))
            .send()
            .await
            .map_err(|e| transport_error("delete", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    async fn disable_engine(&self, path: &str) -> StoreResult<()> {
        let mount = path.trim_matches('/');
        debug!("Disabling secrets engine: {}", mount);

        let response = self
            .request(Method::DELETE, self.api_url(&format!("sys/mounts/{}", encode_path(mount))))
            .send()
            .await
            .map_err(|e| transport_error("disable engine", e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::MountNotFound(mount.to_string()));
        }
        if status == StatusCode::BAD_REQUEST {
            let message = error_message(response).await;
            if message.contains("no matching mount") {
                return Err(StoreError::MountNotFound(mount.to_string()));
            }
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        check_status(response).await?;

        if self.is_own_mount(mount) {
            *self.detected_version.write().await = None;
        }
        info!("Disabled secrets engine: {}", mount);
        Ok(())
    }

    async fn enable_engine(&self, path: &str, version: KvVersion) -> StoreResult<()> {
        let mount = path.trim_matches('/');
        debug!("Enabling KV v{} secrets engine: {}", version, mount);

        let body = serde_json::json!({
            "type": "kv",
            "options": { "version": version.as_str() }
        });

        let response = self
            .request(Method::POST, self.api_url(&format!("sys/mounts/{}", encode_path(mount))))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("enable engine", e))?;

        check_status(response).await?;

        if self.is_own_mount(mount) {
            *self.detected_version.write().await = Some(version);
        }
        info!("Enabled KV v{} secrets engine: {}", version, mount);
        Ok(())
    }
}

fn build_http_client(config: &VaultConfig) -> StoreResult<Client> {
    let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

    match &config.tls.verify {
        TlsVerify::Enabled => {}
        TlsVerify::Disabled => {
            builder = builder.danger_accept_invalid_certs(true);
        }
        TlsVerify::CaBundle(path) => {
            let pem = std::fs::read(path).map_err(|e| {
                StoreError::Tls(format!("failed to read CA bundle {}: {e}", path.display()))
            })?;
            let certs = Certificate::from_pem_bundle(&pem)
                .map_err(|e| StoreError::Tls(format!("invalid CA bundle {}: {e}", path.display())))?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
    }

    if let Some(client_cert) = &config.tls.client_cert {
        // rustls expects certificate and key in a single PEM buffer.
        let mut pem = std::fs::read(&client_cert.cert).map_err(|e| {
            StoreError::Tls(format!(
                "failed to read client certificate {}: {e}",
                client_cert.cert.display()
            ))
        })?;
        let key = std::fs::read(&client_cert.key).map_err(|e| {
            StoreError::Tls(format!(
                "failed to read client key {}: {e}",
                client_cert.key.display()
            ))
        })?;
        pem.push(b'\n');
        pem.extend_from_slice(&key);
        let identity = Identity::from_pem(&pem)
            .map_err(|e| StoreError::Tls(format!("invalid client certificate: {e}")))?;
        builder = builder.identity(identity);
    }

    builder
        .build()
        .map_err(|e| StoreError::Tls(format!("failed to create HTTP client: {e}")))
}

/// Percent-encodes each segment of a slash-separated path.
fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Non-string values written by other tools are kept as their JSON text.
fn into_payload(data: serde_json::Map<String, serde_json::Value>) -> Payload {
    data.into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect()
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> StoreResult<T> {
    response
        .json()
        .await
        .map_err(|e| StoreError::Protocol(format!("failed to parse response: {e}")))
}

async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) if !body.errors.is_empty() => body.errors.join("; "),
        _ => text,
    }
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = error_message(response).await;
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Authentication(message),
        _ => StoreError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

fn transport_error(operation: &str, error: reqwest::Error) -> StoreError {
    if error.is_builder() {
        return StoreError::Protocol(format!("{operation} request invalid: {error}"));
    }

    // The top-level message embeds the URL, so only the causes are inspected.
    let causes = error_causes(&error);
    let lowered = causes.to_lowercase();
    let detail = format!("{error}{causes}");
    if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("handshake") {
        StoreError::Tls(format!("{operation} failed: {detail}"))
    } else {
        StoreError::Connectivity(format!("{operation} failed: {detail}"))
    }
}

fn error_causes(error: &dyn std::error::Error) -> String {
    let mut out = String::new();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
