//! Durable persistence for collaborative rundowns
//!
//! The save coordinator turns applied operations into backing-store writes:
//! debounced, coalescing per-cell saves and fully serialized structural
//! saves carrying canonical content snapshots. The store itself is a trait;
//! concrete providers live with the host. Legacy documents fall back to a
//! whole-document compare-and-swap strategy.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod revision;
pub mod saver;
pub mod store;
pub mod strategy;

pub use revision::{
    derive_action_log, restore_revision, ActionLogEntry, Revision, RevisionId, RevisionType,
};
pub use saver::{SaveCoordinator, SaveCoordinatorConfig, SaveEvent, SnapshotSource};
pub use store::{
    CellSaveRequest, ContentSnapshot, DocumentStore, StructuralOperation, StructuralSaveRequest,
};
pub use strategy::{PendingOperationsSource, SaveStrategy, WholeDocumentSaver};
