//! Core types for the rundown document model
//!
//! This module defines the foundational types:
//! - DocumentId / RowId / UserId / SessionId: identifiers
//! - RowKind: discriminates regular rows from headers
//! - FieldValue: typed cell values (text or scalar)
//! - Row: one entry in the ordered row list
//! - Document: the unit of collaboration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a rundown document
///
/// A DocumentId is a wrapper around a UUID v4. DocumentIds scope every
/// operation log, save queue, and realtime subscription in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Create a new random DocumentId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a DocumentId from a string representation
    ///
    /// Accepts standard UUID format (with or without hyphens).
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a row within a document
///
/// Row ids are globally unique within a document and never reused after a
/// delete. Row order is determined by the document's row list, never by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(Uuid);

impl RowId {
    /// Create a new random RowId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a RowId from a string representation
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a collaborating user
///
/// User ids come from the external auth layer and are treated as opaque
/// strings. Lexicographic ordering on UserId is the deterministic tie-break
/// for concurrent operations with equal timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a UserId from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// View the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier for an advisory edit session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row discriminator
///
/// Headers and regular rows share one sequence; row-number rendering is
/// derived by the UI and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    /// A normal content row
    Regular,
    /// A segment header row
    Header,
}

impl RowKind {
    /// Canonical wire name for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Regular => "regular",
            RowKind::Header => "header",
        }
    }
}

/// A typed cell value
///
/// Field values are either text (UTF-8, treated as a code-point sequence by
/// the text operations) or scalar (number, boolean, or opaque JSON). A field
/// value carries no identity of its own; it is addressed by (row id, field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// UTF-8 text, the target of text_* operations
    Text(String),
    /// Numeric scalar
    Number(f64),
    /// Boolean scalar
    Bool(bool),
    /// Opaque object, array, or null payload
    Json(serde_json::Value),
}

impl FieldValue {
    /// View as text, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True if this is a text value
    pub fn is_text(&self) -> bool {
        matches!(self, FieldValue::Text(_))
    }

    /// Convert into the JSON representation used on the wire
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Json(v) => v.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Data-type discriminator carried by field_update operations
///
/// Detection order matters: arrays are detected before objects, so a JSON
/// array never classifies as `Object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDataType {
    /// UTF-8 text
    String,
    /// Numeric scalar
    Number,
    /// Boolean scalar
    Boolean,
    /// JSON object (or null)
    Object,
    /// JSON array
    Array,
}

impl FieldDataType {
    /// Classify a field value. Arrays are detected first, then objects.
    pub fn of(value: &FieldValue) -> Self {
        match value {
            FieldValue::Text(_) => FieldDataType::String,
            FieldValue::Number(_) => FieldDataType::Number,
            FieldValue::Bool(_) => FieldDataType::Boolean,
            FieldValue::Json(v) => {
                if v.is_array() {
                    FieldDataType::Array
                } else if v.is_string() {
                    FieldDataType::String
                } else if v.is_number() {
                    FieldDataType::Number
                } else if v.is_boolean() {
                    FieldDataType::Boolean
                } else {
                    FieldDataType::Object
                }
            }
        }
    }
}

/// UI-only column descriptor
///
/// Columns describe how the grid renders fields. They are excluded from
/// content signatures: two documents that differ only in column layout are
/// identical content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Field key this column renders
    pub key: String,
    /// Display label
    pub label: String,
    /// Rendered width in pixels, if pinned
    pub width: Option<u32>,
    /// Whether the column is currently shown
    pub visible: bool,
}

/// One entry in the document's ordered row list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Stable identifier, never reused after delete
    pub id: RowId,
    /// Regular row or header
    #[serde(rename = "type")]
    pub kind: RowKind,
    /// Field name → value. Sorted map so iteration order is stable.
    pub fields: BTreeMap<String, FieldValue>,
}

impl Row {
    /// Create an empty row of the given kind with a fresh id
    pub fn new(kind: RowKind) -> Self {
        Self {
            id: RowId::new(),
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Create an empty regular row
    pub fn regular() -> Self {
        Self::new(RowKind::Regular)
    }

    /// Create an empty header row
    pub fn header() -> Self {
        Self::new(RowKind::Header)
    }

    /// Text content of a field; missing or non-text values read as empty
    pub fn text(&self, field: &str) -> &str {
        self.fields
            .get(field)
            .and_then(FieldValue::as_text)
            .unwrap_or("")
    }

    /// Set a field value, returning the previous value if any
    pub fn set_field(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(field.into(), value)
    }

    /// Builder-style field setter for tests and fixtures
    pub fn with_field(mut self, field: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(field.into(), value);
        self
    }
}

/// Document-level text fields addressable by text operations
///
/// Text operations may target the document itself instead of a row; only
/// these fields are valid targets.
pub const DOCUMENT_TEXT_FIELDS: [&str; 2] = ["title", "externalNotes"];

/// The unit of collaboration: an ordered row list plus top-level scalars
///
/// The document is a projection of the operation log. No component mutates
/// it except via an operation apply or a confirmed backing-store
/// notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document identifier
    pub id: DocumentId,
    /// Rundown title
    pub title: String,
    /// Rundown start time (wall-clock "HH:MM:SS"), if scheduled
    pub start_time: Option<String>,
    /// IANA timezone name, if pinned
    pub timezone: Option<String>,
    /// Calendar date of the show
    pub show_date: Option<chrono::NaiveDate>,
    /// Free-form production notes
    pub external_notes: String,
    /// The ordered row list. The order here is the total order.
    pub rows: Vec<Row>,
    /// UI-only column descriptors, excluded from content signatures
    pub columns: Vec<ColumnSpec>,
    /// Optimistic-concurrency version, used only by the legacy
    /// whole-document save path
    pub doc_version: u64,
}

impl Document {
    /// Create an empty document
    pub fn new(id: DocumentId) -> Self {
        Self {
            id,
            title: String::new(),
            start_time: None,
            timezone: None,
            show_date: None,
            external_notes: String::new(),
            rows: Vec::new(),
            columns: Vec::new(),
            doc_version: 0,
        }
    }

    /// Number of rows (headers included)
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of a row in the ordered list
    pub fn row_position(&self, id: &RowId) -> Option<usize> {
        self.rows.iter().position(|r| &r.id == id)
    }

    /// Look up a row by id
    pub fn row(&self, id: &RowId) -> Option<&Row> {
        self.rows.iter().find(|r| &r.id == id)
    }

    /// Look up a row by id, mutably
    pub fn row_mut(&mut self, id: &RowId) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| &r.id == id)
    }

    /// Insert a row at a position, clamping to the list length
    pub fn insert_row(&mut self, position: usize, row: Row) {
        let position = position.min(self.rows.len());
        self.rows.insert(position, row);
    }

    /// Remove the row at a position, if in bounds
    pub fn remove_row(&mut self, position: usize) -> Option<Row> {
        if position < self.rows.len() {
            Some(self.rows.remove(position))
        } else {
            None
        }
    }

    /// Splice-move a row from one position to another
    ///
    /// Out-of-bounds positions and `from == to` are no-ops.
    pub fn move_row(&mut self, from: usize, to: usize) {
        if from == to || from >= self.rows.len() {
            return;
        }
        let row = self.rows.remove(from);
        let to = to.min(self.rows.len());
        self.rows.insert(to, row);
    }

    /// Read a document-level text field by wire name
    pub fn document_text(&self, field: &str) -> Option<&str> {
        match field {
            "title" => Some(&self.title),
            "externalNotes" => Some(&self.external_notes),
            _ => None,
        }
    }

    /// Write a document-level text field by wire name
    ///
    /// Returns false if the field is not a document text field.
    pub fn set_document_text(&mut self, field: &str, value: String) -> bool {
        match field {
            "title" => {
                self.title = value;
                true
            }
            "externalNotes" => {
                self.external_notes = value;
                true
            }
            _ => false,
        }
    }
}
