//! Content signatures: canonical fingerprints for change detection
//!
//! The signature is a SHA-256 over a canonical serialization of the
//! content-bearing state: title, show date, external notes, and the ordered
//! row list with keys in a fixed order. Column/layout metadata, timezone,
//! start time, showcaller playback fields, and UI flags are excluded, so two
//! documents that differ only in those produce identical signatures.
//!
//! The canonical form is built by hand (sorted keys, no whitespace) rather
//! than through a serializer so the byte stream is stable across maps and
//! releases.

use crate::types::{Document, Row};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Row fields serialized in this fixed order, after `id` and `type`
pub const CANONICAL_ROW_FIELDS: [&str; 12] = [
    "name",
    "talent",
    "script",
    "gfx",
    "video",
    "images",
    "notes",
    "duration",
    "startTime",
    "endTime",
    "color",
    "isFloating",
];

/// Known fields serialized after the custom-field map
const TRAILING_ROW_FIELDS: [&str; 2] = ["rowNumber", "segmentName"];

/// Showcaller playback state and UI flags never participate in signatures
fn is_excluded_row_field(key: &str) -> bool {
    key.starts_with("showcaller") || key.starts_with("ui")
}

/// SHA-256 of a byte stream, rendered as lowercase hex
///
/// Deterministic across platforms; the canonical hash for all signature
/// variants.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Write a JSON value in canonical form: sorted object keys, no whitespace
fn write_canonical_value(out: &mut String, value: &serde_json::Value) {
    match value {
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_value(out, item);
            }
            out.push(']');
        }
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(out, key);
                out.push(':');
                write_canonical_value(out, &map[*key]);
            }
            out.push('}');
        }
        // Null, Bool, Number, String render compactly and stably
        _ => out.push_str(&value.to_string()),
    }
}

fn write_json_string(out: &mut String, s: &str) {
    out.push_str(&serde_json::Value::String(s.to_string()).to_string());
}

fn write_row_field(out: &mut String, row: &Row, key: &str) {
    write_json_string(out, key);
    out.push(':');
    match row.fields.get(key) {
        Some(value) => write_canonical_value(out, &value.to_json()),
        None => out.push_str("null"),
    }
}

fn write_canonical_row(out: &mut String, row: &Row) {
    out.push_str("{\"id\":");
    write_json_string(out, &row.id.to_string());
    out.push_str(",\"type\":");
    write_json_string(out, row.kind.as_str());

    for key in CANONICAL_ROW_FIELDS {
        out.push(',');
        write_row_field(out, row, key);
    }

    // Custom fields: everything not in the canonical lists, sorted by key
    out.push_str(",\"customFields\":{");
    let mut first = true;
    for (key, value) in &row.fields {
        if CANONICAL_ROW_FIELDS.contains(&key.as_str())
            || TRAILING_ROW_FIELDS.contains(&key.as_str())
            || is_excluded_row_field(key)
        {
            continue;
        }
        if !first {
            out.push(',');
        }
        first = false;
        write_json_string(out, key);
        out.push(':');
        write_canonical_value(out, &value.to_json());
    }
    out.push('}');

    for key in TRAILING_ROW_FIELDS {
        out.push(',');
        write_row_field(out, row, key);
    }
    out.push('}');
}

/// The canonical title: trimmed and NFC-normalized
fn canonical_title(title: &str) -> String {
    title.trim().nfc().collect()
}

/// Canonical content fingerprint of a document
///
/// Input tuple: (title, show date, external notes, ordered row list). Used
/// by save, undo, and conflict paths; structural saves embed this signature
/// in their snapshots.
pub fn content_signature(doc: &Document) -> String {
    let mut out = String::with_capacity(256 + doc.rows.len() * 256);
    out.push_str("{\"title\":");
    write_json_string(&mut out, &canonical_title(&doc.title));
    out.push_str(",\"showDate\":");
    match &doc.show_date {
        Some(date) => write_json_string(&mut out, &date.to_string()),
        None => out.push_str("null"),
    }
    out.push_str(",\"externalNotes\":");
    write_json_string(&mut out, &doc.external_notes);
    out.push_str(",\"rows\":[");
    for (i, row) in doc.rows.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_canonical_row(&mut out, row);
    }
    out.push_str("]}");
    sha256_hex(out.as_bytes())
}

/// Advisory fingerprint for high-frequency paths (undo gating, dirty probes)
///
/// Covers only (title, row count, per-row (id, name hash)). Never used for
/// conflict resolution.
pub fn lightweight_signature(doc: &Document) -> String {
    let mut out = String::with_capacity(64 + doc.rows.len() * 48);
    out.push_str("{\"title\":");
    write_json_string(&mut out, &canonical_title(&doc.title));
    out.push_str(",\"rowCount\":");
    out.push_str(&doc.rows.len().to_string());
    out.push_str(",\"rows\":[");
    for (i, row) in doc.rows.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('[');
        write_json_string(&mut out, &row.id.to_string());
        out.push(',');
        let name_hash = sha256_hex(row.text("name").as_bytes());
        write_json_string(&mut out, &name_hash[..16]);
        out.push(']');
    }
    out.push_str("]}");
    sha256_hex(out.as_bytes())
}
