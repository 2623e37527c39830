use async_trait::async_trait;
use kpvault_source::{EntrySource, MemorySource, SourceError, SourceResult};
use kpvault_store::{KvVersion, MemoryStore, SecretStore, StoreError, StoreResult};
use kpvault_sync::{ImportError, Importer, ImporterConfig, SyncOutcome};
use kpvault_types::{Entry, KeyCase, Payload};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::Arc;

fn sample_entries() -> Vec<Entry> {
    vec![
        Entry::new("title1", Vec::<String>::new())
            .with_field("username", "user1")
            .with_field("password", "password1")
            .with_field("url", "url1")
            .with_field("notes", "note1"),
        Entry::new("title1group1", ["Group1"])
            .with_field("username", "user1group1")
            .with_field("password", "password1group1"),
        Entry::new("title1group1a", ["Group1", "Group1a"])
            .with_field("username", "user1group1a")
            .with_field("password", "password1group1a"),
        Entry::new("withattachement", Vec::<String>::new())
            .with_field("username", "user2")
            .with_field("password", "password2")
            .with_field("url", "url2")
            .with_field("notes", "note2")
            .with_field("custom_property1", "custom_value1")
            .with_attachment("attached.txt", b"CONTENT\n".to_vec()),
    ]
}

fn statuses(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn all(status: &str) -> BTreeMap<String, String> {
    statuses(&[
        ("keepass/title1", status),
        ("keepass/Group1/title1group1", status),
        ("keepass/Group1/Group1a/title1group1a", status),
        ("keepass/withattachement", status),
    ])
}

fn importer_with(config: ImporterConfig, entries: Vec<Entry>, store: &Arc<MemoryStore>) -> Importer {
    Importer::new(config, Arc::new(MemorySource::new(entries)), store.clone())
}

fn importer(store: &Arc<MemoryStore>) -> Importer {
    importer_with(ImporterConfig::default(), sample_entries(), store)
}

fn dry_run_config() -> ImporterConfig {
    ImporterConfig {
        dry_run: true,
        ..Default::default()
    }
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn default_config() {
    let config = ImporterConfig::default();
    assert_eq!(config.prefix, "keepass/");
    assert!(!config.dry_run);
    assert!(!config.verbose);
    assert_eq!(config.key_case, KeyCase::Preserve);
    assert!(!config.skip_root);
    assert_eq!(config.kv_version, KvVersion::V2);
}

// ── export_to_vault ─────────────────────────────────────────────

#[tokio::test]
async fn first_run_reports_new_and_writes_payloads() {
    let store = Arc::new(MemoryStore::new("secret"));
    let report = importer(&store).export_to_vault().await.unwrap();

    assert_eq!(report.statuses(), &all("new"));
    assert_eq!(report.count(SyncOutcome::New), 4);
    assert_eq!(store.write_count().await, 4);

    let stored = store.read("keepass/withattachement").await.unwrap().unwrap();
    assert_eq!(stored.get("0/attached.txt"), Some("Q09OVEVOVAo="));
    assert_eq!(stored.get("custom_property1"), Some("custom_value1"));
    assert_eq!(stored.get("notes"), Some("note2"));
    assert_eq!(stored.get("password"), Some("password2"));
    assert_eq!(stored.get("url"), Some("url2"));
    assert_eq!(stored.get("username"), Some("user2"));
    assert!(!stored.contains_key("Notes"));
}

#[tokio::test]
async fn second_run_is_ok_and_writes_nothing() {
    let store = Arc::new(MemoryStore::new("secret"));
    let importer = importer(&store);

    importer.export_to_vault().await.unwrap();
    let after_first = store.snapshot().await;
    let writes = store.write_count().await;

    let second = importer.export_to_vault().await.unwrap();
    assert_eq!(second.statuses(), &all("ok"));
    assert_eq!(store.snapshot().await, after_first);
    assert_eq!(store.write_count().await, writes);

    let third = importer.export_to_vault().await.unwrap();
    assert_eq!(third, second);
}

#[tokio::test]
async fn changed_entry_is_fully_replaced() {
    let store = Arc::new(MemoryStore::new("secret"));
    let stale: Payload = [("password", "old"), ("username", "user1"), ("legacy", "x")]
        .into_iter()
        .collect();
    store.write("keepass/title1", &stale).await.unwrap();

    let report = importer(&store).export_to_vault().await.unwrap();
    assert_eq!(report.outcome("keepass/title1"), Some(SyncOutcome::Changed));
    assert_eq!(report.statuses()["keepass/title1"], "changed");

    let stored = store.read("keepass/title1").await.unwrap().unwrap();
    assert!(!stored.contains_key("legacy"));
    assert_eq!(stored.get("password"), Some("password1"));
}

#[tokio::test]
async fn verbose_reports_rendered_change() {
    let store = Arc::new(MemoryStore::new("secret"));
    let stale: Payload = [
        ("password", "old"),
        ("username", "user1"),
        ("url", "url1"),
        ("legacy", "x"),
    ]
    .into_iter()
    .collect();
    store.write("keepass/title1", &stale).await.unwrap();

    let config = ImporterConfig {
        verbose: true,
        ..Default::default()
    };
    let report = importer_with(config, sample_entries(), &store)
        .export_to_vault()
        .await
        .unwrap();

    assert_eq!(
        report.statuses()["keepass/title1"],
        "changed: keepass/title1 added notes, removed legacy, changed password"
    );
    assert_eq!(report.statuses()["keepass/withattachement"], "new");
}

#[tokio::test]
async fn unrelated_secrets_are_untouched() {
    let store = Arc::new(MemoryStore::new("secret"));
    let other: Payload = [("k", "v")].into_iter().collect();
    store.write("elsewhere/secret", &other).await.unwrap();

    importer(&store).export_to_vault().await.unwrap();
    assert_eq!(store.read("elsewhere/secret").await.unwrap(), Some(other));
}

// ── dry_run ─────────────────────────────────────────────────────

#[tokio::test]
async fn dry_run_matches_live_run_without_writing() {
    let dry_store = Arc::new(MemoryStore::new("secret"));
    let live_store = Arc::new(MemoryStore::new("secret"));

    let dry = importer_with(dry_run_config(), sample_entries(), &dry_store)
        .export_to_vault()
        .await
        .unwrap();
    let live = importer(&live_store).export_to_vault().await.unwrap();

    assert_eq!(dry, live);
    assert!(dry_store.snapshot().await.is_empty());
    assert_eq!(dry_store.write_count().await, 0);
}

#[tokio::test]
async fn dry_run_is_repeatable_on_populated_store() {
    let store = Arc::new(MemoryStore::new("secret"));
    let stale: Payload = [("password", "old")].into_iter().collect();
    store.write("keepass/title1", &stale).await.unwrap();
    let before = store.snapshot().await;

    let dry = importer_with(dry_run_config(), sample_entries(), &store);
    let first = dry.export_to_vault().await.unwrap();
    let second = dry.export_to_vault().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.outcome("keepass/title1"), Some(SyncOutcome::Changed));
    assert_eq!(first.count(SyncOutcome::New), 3);
    assert_eq!(store.snapshot().await, before);
    assert_eq!(store.write_count().await, 1);
}

// ── Collisions ──────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_titles_get_suffix_and_converge() {
    let store = Arc::new(MemoryStore::new("secret"));
    let entries = vec![
        Entry::new("dup", ["Group1"]).with_field("password", "first"),
        Entry::new("dup", ["Group1"]).with_field("password", "second"),
    ];
    let importer = importer_with(ImporterConfig::default(), entries, &store);

    let first = importer.export_to_vault().await.unwrap();
    assert_eq!(
        first.statuses(),
        &statuses(&[("keepass/Group1/dup", "new"), ("keepass/Group1/dup (1)", "new")])
    );
    assert_eq!(
        store.read("keepass/Group1/dup (1)").await.unwrap().unwrap().get("password"),
        Some("second")
    );

    let second = importer.export_to_vault().await.unwrap();
    assert_eq!(
        second.statuses(),
        &statuses(&[("keepass/Group1/dup", "ok"), ("keepass/Group1/dup (1)", "ok")])
    );
}

#[tokio::test]
async fn trailing_slash_title_gets_own_secret_and_converges() {
    let store = Arc::new(MemoryStore::new("secret"));
    let entries = vec![
        Entry::new("x", ["g"]).with_field("password", "plain"),
        Entry::new("x/", ["g"]).with_field("password", "slashed"),
    ];
    let importer = importer_with(ImporterConfig::default(), entries, &store);

    let first = importer.export_to_vault().await.unwrap();
    assert_eq!(
        first.statuses(),
        &statuses(&[("keepass/g/x", "new"), ("keepass/g/x (1)", "new")])
    );
    assert_eq!(store.snapshot().await.len(), 2);

    let second = importer.export_to_vault().await.unwrap();
    assert_eq!(second.statuses(), &statuses(&[("keepass/g/x", "ok"), ("keepass/g/x (1)", "ok")]));
    assert_eq!(store.write_count().await, 2);
}

// ── Options ─────────────────────────────────────────────────────

#[tokio::test]
async fn skip_root_omits_root_entries() {
    let store = Arc::new(MemoryStore::new("secret"));
    let config = ImporterConfig {
        skip_root: true,
        ..Default::default()
    };
    let report = importer_with(config, sample_entries(), &store)
        .export_to_vault()
        .await
        .unwrap();

    assert_eq!(
        report.paths().collect::<Vec<_>>(),
        ["keepass/Group1/Group1a/title1group1a", "keepass/Group1/title1group1"]
    );
}

#[tokio::test]
async fn lowercase_folds_keys_and_drops_title_marker() {
    let store = Arc::new(MemoryStore::new("secret"));
    let entries = vec![
        Entry::new("t", Vec::<String>::new())
            .with_field("UserName", "u")
            .with_field("Title", "t")
            .with_field("_path", ""),
    ];
    let config = ImporterConfig {
        key_case: KeyCase::Lower,
        prefix: "imported".to_string(),
        ..Default::default()
    };
    importer_with(config, entries, &store).export_to_vault().await.unwrap();

    let stored = store.read("imported/t").await.unwrap().unwrap();
    assert_eq!(stored.keys().collect::<Vec<_>>(), ["username"]);
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn empty_title_aborts_before_any_write() {
    let store = Arc::new(MemoryStore::new("secret"));
    let mut entries = sample_entries();
    entries.push(Entry::new("", ["Group1"]));

    let err = importer_with(ImporterConfig::default(), entries, &store)
        .export_to_vault()
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::Validation(_)));
    assert_eq!(store.write_count().await, 0);
}

struct BrokenSource;

impl EntrySource for BrokenSource {
    fn describe(&self) -> String {
        "broken".to_string()
    }

    fn entries(&self) -> SourceResult<Vec<Entry>> {
        Err(SourceError::Database("invalid credentials".to_string()))
    }
}

#[tokio::test]
async fn source_failure_is_propagated() {
    let store = Arc::new(MemoryStore::new("secret"));
    let importer = Importer::new(ImporterConfig::default(), Arc::new(BrokenSource), store);
    let err = importer.export_to_vault().await.unwrap_err();
    assert!(matches!(err, ImportError::Source(SourceError::Database(_))));
}

/// Store that rejects every request.
struct RejectingStore {
    admin_error: fn(&str) -> StoreError,
}

#[async_trait]
impl SecretStore for RejectingStore {
    fn backend_name(&self) -> &'static str {
        "rejecting"
    }

    async fn read(&self, _path: &str) -> StoreResult<Option<Payload>> {
        Err(StoreError::Authentication("permission denied".to_string()))
    }

    async fn write(&self, _path: &str, _payload: &Payload) -> StoreResult<()> {
        Err(StoreError::Authentication("permission denied".to_string()))
    }

    async fn list(&self, _prefix: &str) -> StoreResult<Option<Vec<String>>> {
        Err(StoreError::Connectivity("connection refused".to_string()))
    }

    async fn delete(&self, _path: &str) -> StoreResult<()> {
        Err(StoreError::Connectivity("connection refused".to_string()))
    }

    async fn disable_engine(&self, path: &str) -> StoreResult<()> {
        Err((self.admin_error)(path))
    }

    async fn enable_engine(&self, _path: &str, _version: KvVersion) -> StoreResult<()> {
        Ok(())
    }
}

fn rejecting(admin_error: fn(&str) -> StoreError) -> Importer {
    Importer::new(
        ImporterConfig::default(),
        Arc::new(MemorySource::new(sample_entries())),
        Arc::new(RejectingStore { admin_error }),
    )
}

#[tokio::test]
async fn authentication_failure_names_operation_and_path() {
    let err = rejecting(|p| StoreError::MountNotFound(p.to_string()))
        .export_to_vault()
        .await
        .unwrap_err();

    match &err {
        ImportError::Store { operation, path, source } => {
            assert_eq!(*operation, "read");
            assert_eq!(path, "keepass/title1");
            assert!(matches!(source, StoreError::Authentication(_)));
        }
        other => panic!("Expected Store error, got {other:?}"),
    }
    assert!(err.store_error().is_some());
}

#[tokio::test]
async fn erase_connectivity_failure_is_propagated() {
    let err = rejecting(|p| StoreError::MountNotFound(p.to_string()))
        .erase("keepass/")
        .await
        .unwrap_err();
    assert!(matches!(err.store_error(), Some(StoreError::Connectivity(_))));
}

// ── erase ───────────────────────────────────────────────────────

#[tokio::test]
async fn erase_removes_everything_under_prefix() {
    let store = Arc::new(MemoryStore::new("secret"));
    let other: Payload = [("k", "v")].into_iter().collect();
    store.write("elsewhere/secret", &other).await.unwrap();

    let importer = importer(&store);
    importer.export_to_vault().await.unwrap();

    let deleted = importer.erase("keepass/").await.unwrap();
    assert_eq!(deleted, 4);
    assert_eq!(store.list("keepass/").await.unwrap(), None);
    assert_eq!(store.read("elsewhere/secret").await.unwrap(), Some(other));

    // Erasing again is a no-op.
    assert_eq!(importer.erase("keepass/").await.unwrap(), 0);

    // A fresh import after erase starts over.
    assert_eq!(importer.export_to_vault().await.unwrap().statuses(), &all("new"));
}

// ── reset_vault_secrets_engine ──────────────────────────────────

#[tokio::test]
async fn reset_engine_discards_data() {
    let store = Arc::new(MemoryStore::new("secret"));
    let importer = importer(&store);
    importer.export_to_vault().await.unwrap();

    importer.reset_vault_secrets_engine("secret").await.unwrap();
    assert!(store.snapshot().await.is_empty());
    assert!(store.is_mounted("secret").await);

    assert_eq!(importer.export_to_vault().await.unwrap().statuses(), &all("new"));
}

#[tokio::test]
async fn reset_missing_engine_enables_it() {
    let store = Arc::new(MemoryStore::new("secret"));
    importer(&store)
        .reset_vault_secrets_engine("fresh")
        .await
        .unwrap();
    assert!(store.is_mounted("fresh").await);
}

#[tokio::test]
async fn reset_engine_tolerates_mount_not_found() {
    rejecting(|p| StoreError::MountNotFound(p.to_string()))
        .reset_vault_secrets_engine("secret")
        .await
        .unwrap();
}

#[tokio::test]
async fn reset_engine_reraises_other_admin_errors() {
    let err = rejecting(|_| StoreError::Api {
        status: 500,
        message: "internal error".to_string(),
    })
    .reset_vault_secrets_engine("secret")
    .await
    .unwrap_err();

    match err {
        ImportError::Store { operation, source, .. } => {
            assert_eq!(operation, "disable engine");
            assert!(matches!(source, StoreError::Api { status: 500, .. }));
        }
        other => panic!("Expected Store error, got {other:?}"),
    }
}
