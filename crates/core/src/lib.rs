//! Core types for the collaborative rundown engine
//!
//! This crate defines the foundational model shared by every layer:
//! - Identifiers: DocumentId, RowId, UserId, SessionId
//! - Document model: Document, Row, RowKind, FieldValue, ColumnSpec
//! - Operations: the tagged union of transform-eligible changes
//! - Vector clocks: causality comparison for concurrent edits
//! - Signatures: canonical content fingerprints for change detection
//! - Configuration: conflict strategies and timing knobs
//! - Errors: the unified error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod error;
pub mod operation;
pub mod signature;
pub mod types;

// Re-export commonly used types at the crate root
pub use clock::{CausalOrder, VectorClock};
pub use config::{
    EngineConfig, FieldConflictStrategy, StructuralConflictStrategy, TextConflictStrategy,
};
pub use error::{CuelineError, Result};
pub use operation::{
    code_point_len, OpTarget, Operation, OperationId, OperationKind, STRUCTURAL_FIELD,
};
pub use signature::{content_signature, lightweight_signature, sha256_hex};
pub use types::{
    ColumnSpec, Document, DocumentId, FieldDataType, FieldValue, Row, RowId, RowKind, SessionId,
    UserId, DOCUMENT_TEXT_FIELDS,
};
