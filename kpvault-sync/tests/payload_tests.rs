use base64::{Engine, engine::general_purpose::STANDARD};
use kpvault_sync::PayloadBuilder;
use kpvault_types::{Entry, KeyCase};
use pretty_assertions::assert_eq;

fn entry_with_attachment() -> Entry {
    Entry::new("withattachement", Vec::<String>::new())
        .with_field("username", "user2")
        .with_field("password", "password2")
        .with_field("url", "url2")
        .with_field("notes", "note2")
        .with_field("custom_property1", "custom_value1")
        .with_attachment("attached.txt", b"CONTENT\n".to_vec())
}

// ── Fields ───────────────────────────────────────────────────────

#[test]
fn fields_are_carried_verbatim() {
    let payload = PayloadBuilder::default().build(&entry_with_attachment());
    assert_eq!(payload.get("custom_property1"), Some("custom_value1"));
    assert_eq!(payload.get("notes"), Some("note2"));
    assert_eq!(payload.get("password"), Some("password2"));
    assert_eq!(payload.get("url"), Some("url2"));
    assert_eq!(payload.get("username"), Some("user2"));
    assert!(!payload.contains_key("Notes"));
    assert_eq!(payload.len(), 6);
}

#[test]
fn lower_case_rule_applies_to_field_keys() {
    let entry = Entry::new("t", Vec::<String>::new())
        .with_field("UserName", "u")
        .with_field("CustomKey", "c");
    let payload = PayloadBuilder::new(KeyCase::Lower).build(&entry);
    assert_eq!(payload.keys().collect::<Vec<_>>(), ["customkey", "username"]);
}

// ── Reserved keys ────────────────────────────────────────────────

#[test]
fn bookkeeping_markers_never_reach_payload() {
    let entry = Entry::new("t", ["g"])
        .with_field("_entry_name", "t")
        .with_field("_path", "g")
        .with_field("Title", "t")
        .with_field("password", "p");

    for case in [KeyCase::Preserve, KeyCase::Lower] {
        let payload = PayloadBuilder::new(case).build(&entry);
        assert_eq!(payload.keys().collect::<Vec<_>>(), ["password"], "case {case:?}");
    }
}

#[test]
fn lower_case_title_field_kept_when_preserving_case() {
    let entry = Entry::new("t", ["g"]).with_field("title", "custom");
    let payload = PayloadBuilder::new(KeyCase::Preserve).build(&entry);
    assert_eq!(payload.get("title"), Some("custom"));

    let payload = PayloadBuilder::new(KeyCase::Lower).build(&entry);
    assert!(!payload.contains_key("title"));
}

// ── Attachments ──────────────────────────────────────────────────

#[test]
fn attachment_is_base64_under_indexed_key() {
    let payload = PayloadBuilder::default().build(&entry_with_attachment());
    let encoded = payload.get("0/attached.txt").unwrap();
    assert_eq!(encoded, STANDARD.encode(b"CONTENT\n"));
    assert_eq!(STANDARD.decode(encoded).unwrap(), b"CONTENT\n");
}

#[test]
fn attachment_indices_follow_list_order() {
    let entry = Entry::new("t", Vec::<String>::new())
        .with_attachment("z.bin", vec![0u8, 1, 2])
        .with_attachment("a.bin", vec![255u8]);
    let payload = PayloadBuilder::default().build(&entry);
    assert_eq!(payload.keys().collect::<Vec<_>>(), ["0/z.bin", "1/a.bin"]);
    assert_eq!(STANDARD.decode(payload.get("0/z.bin").unwrap()).unwrap(), vec![0u8, 1, 2]);
}

#[test]
fn building_is_deterministic() {
    let entry = entry_with_attachment();
    let builder = PayloadBuilder::new(KeyCase::Lower);
    assert_eq!(builder.build(&entry), builder.build(&entry));
}
