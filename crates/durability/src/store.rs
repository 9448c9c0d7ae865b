//! The backing-store contract and wire shapes
//!
//! The core never talks to a concrete database; it requires a row-level
//! store with a per-field update primitive, an atomic structural update that
//! carries a content snapshot, an optional compare-and-swap whole-document
//! write for legacy documents, and a revision-restore RPC.

use crate::revision::RevisionId;
use async_trait::async_trait;
use cueline_core::{Document, DocumentId, FieldValue, Result, Row, RowId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A per-field write: one field of one row, no document version attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSaveRequest {
    /// Document being edited
    pub document_id: DocumentId,
    /// Row being edited
    pub row_id: RowId,
    /// Field being written
    pub field: String,
    /// The value to persist
    pub value: FieldValue,
    /// Client wall-clock milliseconds at submission
    #[serde(rename = "clientTs")]
    pub client_ts: i64,
}

/// The structural change a save describes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum StructuralOperation {
    /// Reorder the row list to the given id sequence
    #[serde(rename_all = "camelCase")]
    Reorder {
        /// The full new order
        order: Vec<RowId>,
    },
    /// Insert a regular row
    #[serde(rename_all = "camelCase")]
    AddRow {
        /// List index for the new row
        position: usize,
        /// The new row
        row: Row,
    },
    /// Insert a header row
    #[serde(rename_all = "camelCase")]
    AddHeader {
        /// List index for the new header
        position: usize,
        /// The new header row
        row: Row,
    },
    /// Delete a row
    #[serde(rename_all = "camelCase")]
    DeleteRow {
        /// The row to delete
        row_id: RowId,
    },
    /// Duplicate rows to a position
    #[serde(rename_all = "camelCase")]
    CopyRows {
        /// Source rows
        row_ids: Vec<RowId>,
        /// Destination index for the copies
        position: usize,
    },
    /// Move rows to a position
    #[serde(rename_all = "camelCase")]
    MoveRows {
        /// Rows to move
        row_ids: Vec<RowId>,
        /// Destination index
        position: usize,
    },
    /// Lock or unlock rows against editing
    #[serde(rename_all = "camelCase")]
    ToggleLock {
        /// Rows to toggle
        row_ids: Vec<RowId>,
        /// The new lock state
        locked: bool,
    },
}

impl StructuralOperation {
    /// Wire name of this structural kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            StructuralOperation::Reorder { .. } => "reorder",
            StructuralOperation::AddRow { .. } => "add_row",
            StructuralOperation::AddHeader { .. } => "add_header",
            StructuralOperation::DeleteRow { .. } => "delete_row",
            StructuralOperation::CopyRows { .. } => "copy_rows",
            StructuralOperation::MoveRows { .. } => "move_rows",
            StructuralOperation::ToggleLock { .. } => "toggle_lock",
        }
    }

    /// True if a cell write to (row, field) collides with this structural
    /// write and must wait for it
    ///
    /// Pure reordering never touches field content, so cell saves flow
    /// freely around it. Deleting a row blocks every field of that row;
    /// toggling locks blocks the lock field of the affected rows.
    pub fn affects_cell(&self, row_id: RowId, field: &str) -> bool {
        match self {
            StructuralOperation::Reorder { .. }
            | StructuralOperation::AddRow { .. }
            | StructuralOperation::AddHeader { .. }
            | StructuralOperation::CopyRows { .. }
            | StructuralOperation::MoveRows { .. } => false,
            StructuralOperation::DeleteRow { row_id: deleted } => *deleted == row_id,
            StructuralOperation::ToggleLock { row_ids, .. } => {
                field == "isLocked" && row_ids.contains(&row_id)
            }
        }
    }

    /// The set of row ids this structural write rewrites
    pub fn affected_rows(&self) -> BTreeSet<RowId> {
        match self {
            StructuralOperation::Reorder { order } => order.iter().copied().collect(),
            StructuralOperation::AddRow { row, .. }
            | StructuralOperation::AddHeader { row, .. } => [row.id].into_iter().collect(),
            StructuralOperation::DeleteRow { row_id } => [*row_id].into_iter().collect(),
            StructuralOperation::CopyRows { row_ids, .. }
            | StructuralOperation::MoveRows { row_ids, .. }
            | StructuralOperation::ToggleLock { row_ids, .. } => row_ids.iter().copied().collect(),
        }
    }
}

/// The full ordered row list plus its canonical signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSnapshot {
    /// Every row, in document order, at snapshot time
    pub rows_ordered: Vec<Row>,
    /// Canonical content signature of the snapshot source
    pub signature: String,
}

/// A structural write: descriptor plus atomic content snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralSaveRequest {
    /// Document being edited
    pub document_id: DocumentId,
    /// What changed
    #[serde(flatten)]
    pub operation: StructuralOperation,
    /// The row list at the moment the change was decided
    pub snapshot: ContentSnapshot,
}

/// The backing store the save paths write to
///
/// Implementations wrap the concrete database provider. All methods are
/// expected to be idempotent per request so bounded retries are safe.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist one field of one row
    async fn save_cell(&self, request: CellSaveRequest) -> Result<()>;

    /// Persist a structural change atomically with its snapshot
    async fn save_structural(&self, request: StructuralSaveRequest) -> Result<()>;

    /// Legacy whole-document write under compare-and-swap
    ///
    /// Succeeds only if the stored version equals `expected_version`;
    /// returns the new version.
    async fn save_document(&self, document: &Document, expected_version: u64) -> Result<u64>;

    /// Fetch the current document state
    async fn fetch_document(&self, id: DocumentId) -> Result<Document>;

    /// Server-side restore of a document from a stored revision
    async fn restore_from_revision(
        &self,
        target: DocumentId,
        revision_id: RevisionId,
    ) -> Result<()>;
}
