//! Import orchestration.
//!
//! The importer owns the run configuration and drives every entry through
//! path resolution, payload building, classification and (unless dry-running)
//! the store write. Entries are processed strictly one at a time in source
//! order; any store failure aborts the run.

use crate::diff::{classify, render};
use crate::error::{ImportError, ImportResult};
use crate::path::PathResolver;
use crate::payload::PayloadBuilder;
use kpvault_source::EntrySource;
use kpvault_store::{KvVersion, SecretStore};
use kpvault_types::{Entry, KeyCase, ResolvedPath, SyncOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for one importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterConfig {
    /// Path segment prepended to every resolved path.
    pub prefix: String,
    /// Classify and report without writing.
    pub dry_run: bool,
    /// Report `changed` entries with their rendered field diff.
    pub verbose: bool,
    /// Case rule for field keys.
    pub key_case: KeyCase,
    /// Omit entries stored directly in the root group.
    pub skip_root: bool,
    /// Engine version used when re-enabling a secrets engine.
    pub kv_version: KvVersion,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            prefix: "keepass/".to_string(),
            dry_run: false,
            verbose: false,
            key_case: KeyCase::Preserve,
            skip_root: false,
            kv_version: KvVersion::V2,
        }
    }
}

/// Per-path results of one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    outcomes: BTreeMap<String, SyncOutcome>,
    statuses: BTreeMap<String, String>,
}

impl ExportReport {
    fn record(&mut self, path: ResolvedPath, outcome: SyncOutcome, status: String) {
        let path = path.into_string();
        self.outcomes.insert(path.clone(), outcome);
        self.statuses.insert(path, status);
    }

    /// Status string per path: `new`, `ok`, `changed`, or the rendered
    /// change summary for `changed` entries in verbose mode.
    pub fn statuses(&self) -> &BTreeMap<String, String> {
        &self.statuses
    }

    /// Outcome for a path.
    pub fn outcome(&self, path: &str) -> Option<SyncOutcome> {
        self.outcomes.get(path).copied()
    }

    /// Number of paths with the given outcome.
    pub fn count(&self, outcome: SyncOutcome) -> usize {
        self.outcomes.values().filter(|o| **o == outcome).count()
    }

    /// Iterates paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.outcomes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Migrates entries from a source into a secret store.
pub struct Importer {
    config: ImporterConfig,
    source: Arc<dyn EntrySource>,
    store: Arc<dyn SecretStore>,
    resolver: PathResolver,
    builder: PayloadBuilder,
}

impl Importer {
    /// Creates an importer.
    pub fn new(
        config: ImporterConfig,
        source: Arc<dyn EntrySource>,
        store: Arc<dyn SecretStore>,
    ) -> Self {
        let resolver = PathResolver::new(&config.prefix);
        let builder = PayloadBuilder::new(config.key_case);
        Self {
            config,
            source,
            store,
            resolver,
            builder,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    /// Reads all entries from the source, dropping root entries if
    /// configured to.
    async fn read_entries(&self) -> ImportResult<Vec<Entry>> {
        let source = Arc::clone(&self.source);
        debug!("Reading entries from {}", source.describe());

        let entries = tokio::task::spawn_blocking(move || source.entries())
            .await
            .map_err(|e| ImportError::Task(format!("source read task failed: {e}")))??;

        let total = entries.len();
        let entries: Vec<Entry> = if self.config.skip_root {
            entries.into_iter().filter(|e| !e.is_root()).collect()
        } else {
            entries
        };
        info!("Total entries: {} ({} skipped)", entries.len(), total - entries.len());
        Ok(entries)
    }

    /// Exports every entry to the store and reports the outcome per path.
    ///
    /// `new` and `changed` payloads fully replace the stored value unless
    /// `dry_run` is set, in which case nothing is written but the report is
    /// identical to a live run's.
    pub async fn export_to_vault(&self) -> ImportResult<ExportReport> {
        let entries = self.read_entries().await?;
        let paths = self.resolver.resolve(&entries)?;

        let mut report = ExportReport::default();
        for (entry, path) in entries.iter().zip(paths) {
            let candidate = self.builder.build(entry);
            let existing = self
                .store
                .read(path.as_str())
                .await
                .map_err(|e| ImportError::store("read", path.as_str(), e))?;

            let classification = classify(existing.as_ref(), &candidate);
            let outcome = classification.outcome;

            if outcome.needs_write() {
                if self.config.dry_run {
                    debug!("Dry run, not writing {} ({})", path, outcome);
                } else {
                    self.store
                        .write(path.as_str(), &candidate)
                        .await
                        .map_err(|e| ImportError::store("write", path.as_str(), e))?;
                }
                info!("{}", render(outcome, path.as_str(), &classification.diff));
            } else {
                debug!("{}", render(outcome, path.as_str(), &classification.diff));
            }

            let status = if outcome == SyncOutcome::Changed && self.config.verbose {
                render(outcome, path.as_str(), &classification.diff)
            } else {
                outcome.to_string()
            };
            report.record(path, outcome, status);
        }

        info!(
            "Export to {} store {}: {} new, {} changed, {} ok",
            self.store.backend_name(),
            if self.config.dry_run { "dry run complete" } else { "complete" },
            report.count(SyncOutcome::New),
            report.count(SyncOutcome::Changed),
            report.count(SyncOutcome::Ok),
        );
        Ok(report)
    }

    /// Deletes every secret under `prefix`. Erasing an empty prefix is a
    /// no-op. Returns the number of secrets deleted.
    pub async fn erase(&self, prefix: &str) -> ImportResult<usize> {
        let deleted = self
            .store
            .delete_recursive(prefix)
            .await
            .map_err(|e| ImportError::store("erase", prefix, e))?;
        info!(
            "Erased {} secrets under '{}' in {} store",
            deleted,
            prefix,
            self.store.backend_name()
        );
        Ok(deleted)
    }

    /// Disables then re-enables the secrets engine at `path`, discarding
    /// all its data. A missing mount is not an error.
    pub async fn reset_vault_secrets_engine(&self, path: &str) -> ImportResult<()> {
        match self.store.disable_engine(path).await {
            Ok(()) => {}
            Err(e) if e.is_mount_not_found() => {
                debug!("Could not disable secrets engine '{}': mount point not found", path);
            }
            Err(e) => return Err(ImportError::store("disable engine", path, e)),
        }

        self.store
            .enable_engine(path, self.config.kv_version)
            .await
            .map_err(|e| ImportError::store("enable engine", path, e))?;

        info!("Reset secrets engine '{}' (KV v{})", path, self.config.kv_version);
        Ok(())
    }
}
