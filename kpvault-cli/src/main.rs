//! kpvault: import a KeePass database into HashiCorp Vault.
//!
//! Every entry is written under `<mount>/<prefix><group path>/<title>`.
//! Re-running converges the store: unchanged entries report `ok`, modified
//! ones `changed`, and nothing is duplicated.
//!
//! Usage:
//!   kpvault --token ~/.vault-token --vault https://vault:8200 passwords.kdbx
//!
//! Exit code is non-zero if the import fails.

use anyhow::{Context, Result, bail};
use clap::Parser;
use kpvault_source::KdbxSource;
use kpvault_store::{ClientCert, KvVersion, TlsConfig, TlsVerify, VaultClient, VaultConfig};
use kpvault_sync::{Importer, ImporterConfig};
use kpvault_types::KeyCase;
use rpassword::prompt_password;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "kpvault", version)]
#[command(about = "Import a KeePass database into HashiCorp Vault")]
struct Args {
    /// Path to the KeePass database
    #[arg(value_name = "KDBX")]
    kdbx: PathBuf,

    /// Password to unlock the KeePass database (prompted if omitted)
    #[arg(short, long)]
    password: Option<String>,

    /// Key file to unlock the KeePass database
    #[arg(short = 'f', long)]
    keyfile: Option<PathBuf>,

    /// Vault token, or a file containing it (prompted if omitted)
    #[arg(short, long, env = "VAULT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Vault URL
    #[arg(short = 'v', long = "vault", env = "VAULT_ADDR", default_value = "https://localhost:8200")]
    vault_url: String,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long, env = "VAULT_SKIP_VERIFY")]
    ssl_no_verify: bool,

    /// CA bundle used to verify the server certificate
    #[arg(long, env = "VAULT_CACERT", conflicts_with = "ssl_no_verify")]
    ca_cert: Option<PathBuf>,

    /// Client certificate for mutual TLS (PEM)
    #[arg(long, env = "VAULT_CLIENT_CERT", requires = "client_key")]
    client_cert: Option<PathBuf>,

    /// Client key for mutual TLS (PEM)
    #[arg(long, env = "VAULT_CLIENT_KEY", requires = "client_cert")]
    client_key: Option<PathBuf>,

    /// Mount point of the KV secrets engine
    #[arg(short, long, default_value = "secret")]
    mount: String,

    /// KV engine version (detected from the server if omitted)
    #[arg(long, value_parser = ["1", "2"])]
    kv_version: Option<String>,

    /// Path prefix inside the mount (destination of the import)
    #[arg(short = 'b', long, visible_alias = "backend", default_value = "keepass/")]
    prefix: String,

    /// Erase the prefix prior to the import operation
    #[arg(short, long)]
    erase: bool,

    /// Disable and re-enable the secrets engine prior to the import operation
    #[arg(long)]
    reset_engine: bool,

    /// Report what would change without writing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Force keys to be lowercased
    #[arg(short, long)]
    lowercase: bool,

    /// Skip KeePass root folder entries
    #[arg(short, long)]
    skip_root: bool,

    /// Enable verbose debug logging and detailed change reports
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn kv_version(&self) -> Result<Option<KvVersion>> {
        self.kv_version
            .as_deref()
            .map(str::parse)
            .transpose()
            .context("invalid KV version")
    }

    fn tls_config(&self) -> TlsConfig {
        let verify = match (&self.ca_cert, self.ssl_no_verify) {
            (_, true) => TlsVerify::Disabled,
            (Some(bundle), false) => TlsVerify::CaBundle(bundle.clone()),
            (None, false) => TlsVerify::Enabled,
        };
        let client_cert = match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => Some(ClientCert {
                cert: cert.clone(),
                key: key.clone(),
            }),
            _ => None,
        };
        TlsConfig { verify, client_cert }
    }

    fn importer_config(&self) -> Result<ImporterConfig> {
        Ok(ImporterConfig {
            prefix: self.prefix.clone(),
            dry_run: self.dry_run,
            verbose: self.verbose,
            key_case: if self.lowercase {
                KeyCase::Lower
            } else {
                KeyCase::Preserve
            },
            skip_root: self.skip_root,
            kv_version: self.kv_version()?.unwrap_or_default(),
        })
    }
}

/// Uses the first non-empty line of the file if `value` names one.
fn read_token(value: &str) -> Result<String> {
    let path = Path::new(value);
    if !path.is_file() {
        return Ok(value.to_string());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read token file {}", path.display()))?;
    match contents.lines().map(str::trim).find(|line| !line.is_empty()) {
        Some(token) => Ok(token.to_string()),
        None => bail!("token file {} is empty", path.display()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let password = match &args.password {
        Some(password) => password.clone(),
        None => prompt_password("Password: ")?,
    };
    let token = match &args.token {
        Some(value) => read_token(value)?,
        None => prompt_password("Vault token: ")?,
    };

    let vault_config = VaultConfig {
        url: args.vault_url.clone(),
        token,
        mount: args.mount.clone(),
        kv_version: args.kv_version()?,
        tls: args.tls_config(),
        ..Default::default()
    };
    let store = VaultClient::new(vault_config).context("failed to configure Vault client")?;

    let mut source = KdbxSource::new(&args.kdbx).with_password(password);
    if let Some(keyfile) = &args.keyfile {
        source = source.with_keyfile(keyfile);
    }

    let config = args.importer_config()?;
    let importer = Importer::new(config, Arc::new(source), Arc::new(store));

    let dry_run = importer.config().dry_run;
    if args.reset_engine {
        if dry_run {
            info!("Dry run, not resetting secrets engine '{}'", args.mount);
        } else {
            importer.reset_vault_secrets_engine(&args.mount).await?;
        }
    }
    if args.erase {
        if dry_run {
            info!("Dry run, not erasing '{}'", args.prefix);
        } else {
            importer.erase(&args.prefix).await?;
        }
    }

    let report = importer.export_to_vault().await.context("import failed")?;
    for (path, status) in report.statuses() {
        match report.outcome(path) {
            Some(outcome) if outcome.as_str() == status => println!("{status}: {path}"),
            _ => println!("{status}"),
        }
    }

    Ok(())
}
