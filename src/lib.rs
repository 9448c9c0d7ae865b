//! # Cueline
//!
//! The collaborative editing core of a broadcast-rundown authoring tool:
//! multi-user editing of an ordered, typed document with real-time
//! propagation, convergent conflict resolution at field granularity, durable
//! per-cell persistence, and automatic recovery of the realtime transport.
//!
//! # Quick Start
//!
//! ```no_run
//! use cueline::{Document, DocumentId, EngineConfig, FieldValue, OtEngine, Row, UserId};
//! use cueline::{OpTarget, OperationKind};
//!
//! let mut document = Document::new(DocumentId::new());
//! let row = Row::regular().with_field("script", FieldValue::Text("hello".into()));
//! let row_id = row.id;
//! document.rows.push(row);
//!
//! let engine = OtEngine::new(document, EngineConfig::default());
//! let user = UserId::from("alice");
//! engine.register_client(user.clone());
//!
//! engine
//!     .submit_local(
//!         &user,
//!         OpTarget::Row(row_id),
//!         "script",
//!         OperationKind::TextInsert {
//!             position: 5,
//!             content: "!".into(),
//!             length: 1,
//!         },
//!     )
//!     .unwrap();
//!
//! assert_eq!(engine.document().row(&row_id).unwrap().text("script"), "hello!");
//! ```
//!
//! # Architecture
//!
//! | Crate | Responsibility |
//! |-------|----------------|
//! | `cueline-core` | Document model, operations, vector clocks, signatures, config |
//! | `cueline-concurrency` | Pairwise operational transform and conflict records |
//! | `cueline-engine` | Per-document OT engine: log, clients, sessions, apply |
//! | `cueline-durability` | Per-cell save coordinator, store contract, revisions |
//! | `cueline-realtime` | Channel health, reconnection pipeline, auth monitor |
//!
//! The backing store and realtime provider are traits (`DocumentStore`,
//! `Transport`, `ChannelSubscriber`, `SessionProvider`); hosts wire their
//! concrete provider behind them. Everything re-exported here is the stable
//! surface.

pub use cueline_core::{
    clock::CausalOrder, code_point_len, config::EngineConfig, content_signature,
    lightweight_signature, sha256_hex, ColumnSpec, CuelineError, Document, DocumentId,
    FieldConflictStrategy, FieldDataType, FieldValue, OpTarget, Operation, OperationId,
    OperationKind, Result, Row, RowId, RowKind, SessionId, StructuralConflictStrategy,
    TextConflictStrategy, UserId, VectorClock, DOCUMENT_TEXT_FIELDS, STRUCTURAL_FIELD,
};

pub use cueline_concurrency::{
    operations_conflict, transform, transform_against_all, transform_batch, Conflict,
    ConflictKind, ConflictResolution, Transformed,
};

pub use cueline_engine::{
    apply_operation, CleanupReport, EditSession, EngineSnapshot, EngineStats, OperationLogEntry,
    OtEngine, SubmitOutcome, SESSION_ACTIVITY_WINDOW_MS,
};

pub use cueline_durability::{
    derive_action_log, restore_revision, ActionLogEntry, CellSaveRequest, ContentSnapshot,
    DocumentStore, Revision, RevisionId, RevisionType, SaveCoordinator, SaveCoordinatorConfig,
    SaveEvent, SaveStrategy, StructuralOperation, StructuralSaveRequest, WholeDocumentSaver,
};

pub use cueline_realtime::{
    AuthEvent, AuthMonitor, AuthSession, ChannelHealth, ChannelKind, ChannelSubscriber,
    CircuitBreakerConfig, CircuitState, ConnectionState, HealthConfig, PipelineOutcome,
    RealtimeConfig, RealtimeEvent, ReconnectionCoordinator, SessionProvider, Transport,
};
