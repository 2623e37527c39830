//! Sync engine for kpvault.
//!
//! Migrates entries from a credential source into a key/value secret store
//! and converges the store on repeated runs instead of duplicating data.
//!
//! ## Components
//!
//! - **Path Resolver**: maps group hierarchy and title to a unique store path
//! - **Payload Builder**: flattens fields and attachments into a payload
//! - **Diff Engine**: classifies a payload against the stored value
//! - **Importer**: drives the above per entry and writes unless dry-running
//!
//! ## Run
//!
//! 1. Read every entry from the source, in source order
//! 2. Resolve all paths, numbering same-run collisions
//! 3. For each entry: build payload, read stored value, classify
//! 4. Write `new` and `changed` payloads (full replace) unless `dry_run`
//!
//! # Example
//!
//! ```
//! use kpvault_sync::{export_info, SyncOutcome};
//! use kpvault_types::Payload;
//!
//! let info = export_info(SyncOutcome::Ok, "PATH", &Payload::new(), &Payload::new());
//! assert_eq!(info, "ok: PATH");
//! ```

mod diff;
mod error;
mod importer;
mod path;
mod payload;

pub use diff::{Classification, classify, export_info, render};
pub use error::{ImportError, ImportResult};
pub use importer::{ExportReport, Importer, ImporterConfig};
pub use path::PathResolver;
pub use payload::PayloadBuilder;

pub use kpvault_types::{FieldDiff, SyncOutcome};
