//! The operational-transform engine for one rundown document
//!
//! Owns the operation log, per-client queues, and advisory edit sessions;
//! transforms submissions against the concurrent set and folds them into the
//! document projection. Persistence and realtime transport live in sibling
//! crates; this one is purely in-memory.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod client;
pub mod engine;
pub mod log;
pub mod session;

pub use apply::apply_operation;
pub use client::ClientState;
pub use engine::{
    AppliedCallback, CleanupReport, ConflictCallback, EngineSnapshot, EngineStats, OtEngine,
    SubmitOutcome,
};
pub use log::{OperationLog, OperationLogEntry};
pub use session::{EditSession, SessionTracker, SESSION_ACTIVITY_WINDOW_MS};
