//! Payload classification and change rendering.

use kpvault_types::{FieldDiff, Payload, SyncOutcome};
use std::collections::BTreeSet;

/// Result of comparing a candidate payload with the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub outcome: SyncOutcome,
    /// Empty unless `outcome` is `Changed`.
    pub diff: FieldDiff,
}

/// Classifies `candidate` against the value currently stored at its path.
pub fn classify(existing: Option<&Payload>, candidate: &Payload) -> Classification {
    match existing {
        None => Classification {
            outcome: SyncOutcome::New,
            diff: FieldDiff::default(),
        },
        Some(current) if current == candidate => Classification {
            outcome: SyncOutcome::Ok,
            diff: FieldDiff::default(),
        },
        Some(current) => Classification {
            outcome: SyncOutcome::Changed,
            diff: FieldDiff::between(current, candidate),
        },
    }
}

/// Renders an outcome as a one-line summary.
///
/// `ok` and `new` render as `"<outcome>: <path>"`. `changed` appends the
/// non-empty clauses `added …`, `removed …`, `changed …` in that order,
/// comma-separated, each listing its keys sorted and space-joined.
pub fn render(outcome: SyncOutcome, path: &str, diff: &FieldDiff) -> String {
    let mut line = format!("{outcome}: {path}");
    if outcome != SyncOutcome::Changed {
        return line;
    }

    let clauses: Vec<String> = [
        ("added", &diff.added),
        ("removed", &diff.removed),
        ("changed", &diff.changed),
    ]
    .into_iter()
    .filter(|(_, keys)| !keys.is_empty())
    .map(|(label, keys)| format!("{label} {}", join_keys(keys)))
    .collect();

    if !clauses.is_empty() {
        line.push(' ');
        line.push_str(&clauses.join(", "));
    }
    line
}

/// Renders the change summary between two payloads for a given outcome.
pub fn export_info(outcome: SyncOutcome, path: &str, old: &Payload, new: &Payload) -> String {
    render(outcome, path, &FieldDiff::between(old, new))
}

fn join_keys(keys: &BTreeSet<String>) -> String {
    keys.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}
