//! KeePass KDBX database reader.
//!
//! Strings come from the parsed database. Attachments are linked to entries
//! only in the decrypted XML (`<Binary><Key/><Value Ref/></Binary>`), so the
//! XML is scanned for those references and each one is resolved against the
//! database's binary pool: the inner header for KDBX4, `Meta/Binaries` for
//! KDBX3.

use crate::{EntrySource, SourceError, SourceResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use keepass::config::DatabaseVersion;
use keepass::db::{Entry as KdbxEntry, Group};
use keepass::{Database, DatabaseKey};
use kpvault_types::{Attachment, Entry};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use xml::reader::{ParserConfig, XmlEvent};

const STANDARD_FIELDS: [&str; 4] = ["UserName", "Password", "URL", "Notes"];

/// Maps a KeePass field name to the key used in the entry's field map.
///
/// Standard fields are given short lower-case names; `Title` yields `None`
/// because it becomes the entry title. Custom fields pass through unchanged.
pub fn normalize_field_name(key: &str) -> Option<&str> {
    match key {
        "Title" => None,
        "UserName" => Some("username"),
        "Password" => Some("password"),
        "URL" => Some("url"),
        "Notes" => Some("notes"),
        custom => Some(custom),
    }
}

/// Reads entries from a KDBX file unlocked by password and/or key file.
pub struct KdbxSource {
    path: PathBuf,
    password: Option<String>,
    keyfile: Option<PathBuf>,
}

impl KdbxSource {
    /// Creates a source for the database at `path` with no credentials.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            password: None,
            keyfile: None,
        }
    }

    /// Sets the master password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the key file.
    #[must_use]
    pub fn with_keyfile(mut self, keyfile: impl Into<PathBuf>) -> Self {
        self.keyfile = Some(keyfile.into());
        self
    }

    /// Returns the database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(&self) -> SourceResult<DatabaseKey> {
        let mut key = DatabaseKey::new();
        if let Some(password) = &self.password {
            key = key.with_password(password);
        }
        if let Some(keyfile) = &self.keyfile {
            let mut reader = File::open(keyfile).map_err(|e| io_error(keyfile, e))?;
            key = key.with_keyfile(&mut reader).map_err(|e| io_error(keyfile, e))?;
        }
        Ok(key)
    }

    /// Decrypts the database. The XML is only returned for KDBX files;
    /// KeePass 1 databases carry no attachment references.
    fn open(&self) -> SourceResult<(Database, Option<Vec<u8>>)> {
        let data = std::fs::read(&self.path).map_err(|e| io_error(&self.path, e))?;
        let key = self.key()?;

        let db = Database::parse(&data, key.clone()).map_err(|e| self.database_error(e))?;
        let xml = match db.config.version {
            DatabaseVersion::KDB3(_) | DatabaseVersion::KDB4(_) => Some(
                Database::get_xml(&mut data.as_slice(), key).map_err(|e| self.database_error(e))?,
            ),
            _ => None,
        };
        Ok((db, xml))
    }

    fn database_error(&self, error: impl std::fmt::Display) -> SourceError {
        SourceError::Database(format!("failed to open {}: {error}", self.path.display()))
    }
}

impl EntrySource for KdbxSource {
    fn describe(&self) -> String {
        format!("KeePass database {}", self.path.display())
    }

    fn entries(&self) -> SourceResult<Vec<Entry>> {
        let (db, xml) = self.open()?;
        let entries = read_entries(&db, xml.as_deref())?;
        info!("Read {} entries from {}", entries.len(), self.path.display());
        Ok(entries)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Converts every entry of an opened database, linking attachments through
/// the references found in `xml`.
fn read_entries(db: &Database, xml: Option<&[u8]>) -> SourceResult<Vec<Entry>> {
    let refs = match xml {
        Some(xml) => binary_refs(xml)?,
        None => HashMap::new(),
    };

    let mut entries = Vec::new();
    let mut group_path = Vec::new();
    collect_entries(db, &db.root, &refs, &mut group_path, &mut entries);
    Ok(entries)
}

/// Depth-first walk: a group's own entries, then each sub-group. The root
/// group's name is not part of any group path.
fn collect_entries(
    db: &Database,
    group: &Group,
    refs: &HashMap<String, Vec<BinaryRef>>,
    group_path: &mut Vec<String>,
    out: &mut Vec<Entry>,
) {
    for entry in &group.entries {
        let uuid = STANDARD.encode(entry.uuid.as_bytes());
        let attachments = refs
            .get(&uuid)
            .map(|refs| resolve_attachments(db, refs))
            .unwrap_or_default();
        out.push(convert_entry(entry, group_path, attachments));
    }
    for child in &group.groups {
        group_path.push(child.name.clone());
        collect_entries(db, child, refs, group_path, out);
        group_path.pop();
    }
}

/// Standard fields are placed first; a custom field whose name equals a
/// normalized standard name is dropped when that slot is already taken.
fn convert_entry(source: &KdbxEntry, group_path: &[String], attachments: Vec<Attachment>) -> Entry {
    let title = source.get_title().unwrap_or_default();
    let mut entry = Entry::new(title, group_path.iter().cloned());

    for key in STANDARD_FIELDS {
        let (Some(name), Some(text)) = (normalize_field_name(key), source.get(key)) else {
            continue;
        };
        if !text.is_empty() {
            entry.fields.insert(name.to_string(), text.to_string());
        }
    }

    let mut custom: Vec<&String> = source
        .fields
        .keys()
        .filter(|key| key.as_str() != "Title" && !STANDARD_FIELDS.contains(&key.as_str()))
        .collect();
    custom.sort();
    for key in custom {
        let Some(text) = source.get(key) else {
            continue;
        };
        if entry.fields.contains_key(key.as_str()) {
            warn!(
                "Entry '{}' has a custom field '{}' shadowed by a standard field, skipping it",
                entry.title, key
            );
            continue;
        }
        entry.fields.insert(key.clone(), text.to_string());
    }

    entry.attachments = attachments;

    debug!(
        "Read entry '{}' in '{}' ({} fields, {} attachments)",
        entry.title,
        entry.group(),
        entry.fields.len(),
        entry.attachments.len()
    );
    entry
}

/// An entry's reference into the database's binary pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct BinaryRef {
    name: String,
    id: String,
}

fn resolve_attachments(db: &Database, refs: &[BinaryRef]) -> Vec<Attachment> {
    refs.iter()
        .filter_map(|binary| match binary_content(db, &binary.id) {
            Some(content) => Some(Attachment::new(binary.name.as_str(), content.to_vec())),
            None => {
                warn!("Attachment '{}' references missing binary {}", binary.name, binary.id);
                None
            }
        })
        .collect()
}

fn binary_content<'a>(db: &'a Database, id: &str) -> Option<&'a [u8]> {
    match db.config.version {
        DatabaseVersion::KDB4(_) => {
            let index: usize = id.parse().ok()?;
            db.header_attachments.get(index).map(|a| a.content.as_slice())
        }
        _ => db
            .meta
            .binaries
            .binaries
            .iter()
            .find(|b| b.identifier.as_deref() == Some(id))
            .map(|b| b.content.as_slice()),
    }
}

#[derive(Default)]
struct EntryScan {
    depth: usize,
    uuid: String,
    refs: Vec<BinaryRef>,
    pending: Option<BinaryRef>,
}

/// Collects the binary references of every entry, in document order, keyed
/// by the entry's UUID as written in the XML. History snapshots are skipped.
fn binary_refs(xml: &[u8]) -> SourceResult<HashMap<String, Vec<BinaryRef>>> {
    let reader = ParserConfig::new()
        .whitespace_to_characters(true)
        .cdata_to_characters(true)
        .create_reader(xml);

    let mut refs = HashMap::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<EntryScan> = None;

    for event in reader {
        let event = event.map_err(|e| SourceError::Database(format!("malformed database XML: {e}")))?;
        match event {
            XmlEvent::StartElement { name, attributes, .. } => {
                stack.push(name.local_name);
                let depth = stack.len();
                let tag = stack[depth - 1].as_str();
                match current.as_mut() {
                    None if tag == "Entry" => {
                        current = Some(EntryScan {
                            depth,
                            ..Default::default()
                        });
                    }
                    Some(scan) if tag == "Binary" && depth == scan.depth + 1 => {
                        scan.pending = Some(BinaryRef::default());
                    }
                    Some(scan) if tag == "Value" && depth == scan.depth + 2 => {
                        if let Some(pending) = scan.pending.as_mut() {
                            if let Some(attr) = attributes.iter().find(|a| a.name.local_name == "Ref") {
                                pending.id = attr.value.clone();
                            }
                        }
                    }
                    _ => {}
                }
            }
            XmlEvent::Characters(text) => {
                let depth = stack.len();
                if let Some(scan) = current.as_mut() {
                    match stack.last().map(String::as_str) {
                        Some("UUID") if depth == scan.depth + 1 => scan.uuid = text,
                        Some("Key") if depth == scan.depth + 2 => {
                            if let Some(pending) = scan.pending.as_mut() {
                                pending.name = text;
                            }
                        }
                        _ => {}
                    }
                }
            }
            XmlEvent::EndElement { .. } => {
                let depth = stack.len();
                let tag = stack.pop().unwrap_or_default();
                let Some(scan) = current.as_mut() else {
                    continue;
                };
                if tag == "Binary" && depth == scan.depth + 1 {
                    if let Some(binary) = scan.pending.take() {
                        scan.refs.push(binary);
                    }
                } else if depth == scan.depth {
                    if let Some(scan) = current.take() {
                        if !scan.refs.is_empty() {
                            refs.insert(scan.uuid, scan.refs);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(refs)
}
