//! The operation model: a tagged union of transform-eligible changes
//!
//! Every edit is recorded as an `Operation`: a common envelope (id, target,
//! field, user, timestamp, vector clock) plus a kind-specific payload. Text
//! positions are code-point indices into the current logical value, never
//! byte offsets. Structural positions are signed so a transform can produce
//! the `-1` no-op sentinel.

use crate::clock::{CausalOrder, VectorClock};
use crate::error::{CuelineError, Result};
use crate::types::{FieldDataType, FieldValue, Row, RowId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field name that structural operations target
pub const STRUCTURAL_FIELD: &str = "items";

/// Wire name for the document-level target
const DOCUMENT_TARGET: &str = "rundown";

/// What an operation addresses: the document itself or one row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OpTarget {
    /// The document (top-level fields and the row list)
    Document,
    /// A single row
    Row(RowId),
}

impl From<OpTarget> for String {
    fn from(target: OpTarget) -> String {
        match target {
            OpTarget::Document => DOCUMENT_TARGET.to_string(),
            OpTarget::Row(id) => id.to_string(),
        }
    }
}

impl TryFrom<String> for OpTarget {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s == DOCUMENT_TARGET {
            return Ok(OpTarget::Document);
        }
        RowId::from_string(&s)
            .map(OpTarget::Row)
            .ok_or_else(|| format!("invalid operation target: {s}"))
    }
}

impl fmt::Display for OpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpTarget::Document => write!(f, "{DOCUMENT_TARGET}"),
            OpTarget::Row(id) => write!(f, "{id}"),
        }
    }
}

/// Operation identity: (user, timestamp, per-user sequence)
///
/// The sequence is monotonically increasing per user. The timestamp is
/// wall-clock milliseconds and is used only as a tie-breaker, never for
/// correctness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationId {
    /// Originating user
    pub user_id: UserId,
    /// Wall-clock milliseconds at creation
    pub timestamp: i64,
    /// Per-user monotonic sequence number
    pub sequence: u64,
}

/// Kind-specific payload of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OperationKind {
    /// Insert text at a code-point position
    #[serde(rename_all = "camelCase")]
    TextInsert {
        /// Code-point index in the current value
        position: usize,
        /// Inserted text
        content: String,
        /// Declared length; must equal the code-point count of `content`
        length: usize,
    },
    /// Delete a text range
    #[serde(rename_all = "camelCase")]
    TextDelete {
        /// Code-point index of the range start
        position: usize,
        /// Code-point count to delete
        length: usize,
        /// The deleted text, kept for undo and diagnostics
        deleted_content: String,
    },
    /// Replace a text range
    #[serde(rename_all = "camelCase")]
    TextReplace {
        /// Code-point index of the range start
        position: usize,
        /// Code-point count of the replaced range
        length: usize,
        /// Replacement text
        new_content: String,
        /// The replaced text
        old_content: String,
    },
    /// Overwrite a whole field value
    #[serde(rename_all = "camelCase")]
    FieldUpdate {
        /// The value after the update
        new_value: FieldValue,
        /// The value before the update
        old_value: FieldValue,
        /// Declared type of the new value
        data_type: FieldDataType,
    },
    /// Insert a row into the ordered list
    #[serde(rename_all = "camelCase")]
    ItemInsert {
        /// List index; `-1` marks a transformed-away no-op
        position: i64,
        /// The inserted row
        row: Row,
    },
    /// Delete a row from the ordered list
    #[serde(rename_all = "camelCase")]
    ItemDelete {
        /// List index; `-1` marks a transformed-away no-op
        position: i64,
        /// The removed row, kept for undo and diagnostics
        deleted_row: Row,
    },
    /// Splice-move a row within the ordered list
    #[serde(rename_all = "camelCase")]
    ItemMove {
        /// Source index
        from_position: i64,
        /// Destination index; equal to `from_position` marks a no-op
        to_position: i64,
        /// The moved row's id
        row_id: RowId,
    },
}

impl OperationKind {
    /// Wire name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::TextInsert { .. } => "text_insert",
            OperationKind::TextDelete { .. } => "text_delete",
            OperationKind::TextReplace { .. } => "text_replace",
            OperationKind::FieldUpdate { .. } => "field_update",
            OperationKind::ItemInsert { .. } => "item_insert",
            OperationKind::ItemDelete { .. } => "item_delete",
            OperationKind::ItemMove { .. } => "item_move",
        }
    }

    /// True for text_insert / text_delete / text_replace
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            OperationKind::TextInsert { .. }
                | OperationKind::TextDelete { .. }
                | OperationKind::TextReplace { .. }
        )
    }

    /// True for item_insert / item_delete / item_move
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            OperationKind::ItemInsert { .. }
                | OperationKind::ItemDelete { .. }
                | OperationKind::ItemMove { .. }
        )
    }
}

/// A recorded, transform-eligible change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Operation identity
    pub id: OperationId,
    /// Document or row target
    #[serde(rename = "targetId")]
    pub target: OpTarget,
    /// Field the operation addresses ("items" for structural ops)
    pub field: String,
    /// Originating user (duplicated from `id` for wire compatibility)
    pub user_id: UserId,
    /// Wall-clock milliseconds, tie-break only
    pub timestamp: i64,
    /// Causality clock at creation
    pub vector_clock: VectorClock,
    /// Kind-specific payload
    #[serde(flatten)]
    pub kind: OperationKind,
}

/// Code-point length of a string, the unit all text positions use
pub fn code_point_len(s: &str) -> usize {
    s.chars().count()
}

impl Operation {
    /// Build an operation envelope from a creator's current state
    ///
    /// The creator supplies its user id, the next per-user sequence, and its
    /// current vector clock; the clock is stamped with the new sequence so
    /// the operation carries its own causal position.
    pub fn create(
        user_id: UserId,
        sequence: u64,
        mut vector_clock: VectorClock,
        target: OpTarget,
        field: impl Into<String>,
        timestamp: i64,
        kind: OperationKind,
    ) -> Self {
        vector_clock.record(&user_id, sequence);
        Self {
            id: OperationId {
                user_id: user_id.clone(),
                timestamp,
                sequence,
            },
            target,
            field: field.into(),
            user_id,
            timestamp,
            vector_clock,
            kind,
        }
    }

    /// Validate the envelope and payload
    ///
    /// Rejected operations are never logged or transformed.
    pub fn validate(&self) -> Result<()> {
        if self.field.is_empty() {
            return Err(CuelineError::invalid_operation("field must not be empty"));
        }
        if self.user_id != self.id.user_id {
            return Err(CuelineError::invalid_operation(
                "envelope user does not match operation id",
            ));
        }

        match &self.kind {
            OperationKind::TextInsert {
                content, length, ..
            } => {
                if *length != code_point_len(content) {
                    return Err(CuelineError::invalid_operation(format!(
                        "text_insert declared length {} does not match content length {}",
                        length,
                        code_point_len(content)
                    )));
                }
            }
            OperationKind::TextDelete { .. } => {}
            OperationKind::TextReplace {
                length,
                old_content,
                ..
            } => {
                if *length != code_point_len(old_content) {
                    return Err(CuelineError::invalid_operation(format!(
                        "text_replace declared length {} does not match replaced length {}",
                        length,
                        code_point_len(old_content)
                    )));
                }
            }
            OperationKind::FieldUpdate {
                new_value,
                data_type,
                ..
            } => {
                if *data_type != FieldDataType::of(new_value) {
                    return Err(CuelineError::invalid_operation(format!(
                        "field_update data type {:?} does not match new value",
                        data_type
                    )));
                }
            }
            OperationKind::ItemInsert { position, .. }
            | OperationKind::ItemDelete { position, .. } => {
                self.validate_structural_envelope()?;
                if *position < 0 {
                    return Err(CuelineError::invalid_operation(
                        "structural position must be non-negative at submission",
                    ));
                }
            }
            OperationKind::ItemMove {
                from_position,
                to_position,
                ..
            } => {
                self.validate_structural_envelope()?;
                if *from_position < 0 || *to_position < 0 {
                    return Err(CuelineError::invalid_operation(
                        "structural position must be non-negative at submission",
                    ));
                }
                if from_position == to_position {
                    return Err(CuelineError::invalid_operation(
                        "item_move source and destination must differ",
                    ));
                }
            }
        }

        Ok(())
    }

    fn validate_structural_envelope(&self) -> Result<()> {
        if self.target != OpTarget::Document {
            return Err(CuelineError::invalid_operation(
                "structural operations must target the document",
            ));
        }
        if self.field != STRUCTURAL_FIELD {
            return Err(CuelineError::invalid_operation(format!(
                "structural operations must target the \"{STRUCTURAL_FIELD}\" field"
            )));
        }
        Ok(())
    }

    /// True if this operation happened before the other
    pub fn happens_before(&self, other: &Operation) -> bool {
        self.vector_clock.compare(&other.vector_clock) == CausalOrder::Before
    }

    /// True if neither operation happened before the other
    pub fn concurrent_with(&self, other: &Operation) -> bool {
        self.vector_clock.concurrent_with(&other.vector_clock)
    }

    /// Deterministic tie-break: later (timestamp, userId) wins
    pub fn is_later_than(&self, other: &Operation) -> bool {
        (self.timestamp, &self.user_id) > (other.timestamp, &other.user_id)
    }

    /// True if both operations address the same (target, field)
    pub fn same_cell(&self, other: &Operation) -> bool {
        self.target == other.target && self.field == other.field
    }

    /// The half-open code-point interval `[position, position + len)` a text
    /// operation affects; insert length is the content length
    pub fn text_span(&self) -> Option<(usize, usize)> {
        match &self.kind {
            OperationKind::TextInsert {
                position, length, ..
            } => Some((*position, *length)),
            OperationKind::TextDelete {
                position, length, ..
            } => Some((*position, *length)),
            OperationKind::TextReplace {
                position, length, ..
            } => Some((*position, *length)),
            _ => None,
        }
    }

    /// True if the operation has been transformed into a no-op
    pub fn is_noop(&self) -> bool {
        match &self.kind {
            OperationKind::TextInsert { content, .. } => content.is_empty(),
            OperationKind::TextDelete { length, .. } => *length == 0,
            OperationKind::TextReplace {
                length,
                new_content,
                ..
            } => *length == 0 && new_content.is_empty(),
            OperationKind::ItemInsert { position, .. }
            | OperationKind::ItemDelete { position, .. } => *position < 0,
            OperationKind::ItemMove {
                from_position,
                to_position,
                ..
            } => from_position == to_position,
            _ => false,
        }
    }
}
