//! Payload construction.

use base64::{Engine, engine::general_purpose::STANDARD};
use kpvault_types::{Entry, KeyCase, Payload, ReservedKey};
use tracing::debug;

/// Flattens an entry into the payload written to the store.
///
/// Field keys go through the case rule and reserved bookkeeping keys are
/// dropped. Attachment `i` contributes key `"<i>/<filename>"` holding the
/// standard base64 encoding of its content.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadBuilder {
    case: KeyCase,
}

impl PayloadBuilder {
    pub fn new(case: KeyCase) -> Self {
        Self { case }
    }

    /// Builds the payload for an entry.
    pub fn build(&self, entry: &Entry) -> Payload {
        let mut payload = Payload::new();

        // Fields iterate in key order, so if case folding merges two keys
        // the lexically last original wins.
        for (key, value) in &entry.fields {
            let key = self.case.apply(key);
            if let Some(reserved) = ReservedKey::classify(&key, self.case) {
                debug!("Skipping reserved key {:?} on '{}'", reserved, entry.title);
                continue;
            }
            payload.insert(key, value.as_str());
        }

        for (index, attachment) in entry.attachments.iter().enumerate() {
            payload.insert(
                format!("{index}/{}", attachment.filename),
                STANDARD.encode(&attachment.content),
            );
        }

        payload
    }
}
