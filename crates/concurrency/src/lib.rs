//! Operational transform for concurrent rundown edits
//!
//! This crate resolves concurrent operations pairwise:
//! - `conflict`: the concurrent-conflict predicate and conflict records
//! - `transform`: pairwise transform dispatch over the operation tags
//! - `batch`: folding operations through a server-ordered concurrent set
//!
//! Transforms are pure functions; the engine crate owns all state.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod conflict;
mod structural;
mod text;
pub mod transform;

pub use batch::{transform_against_all, transform_batch, BatchTransformed};
pub use conflict::{operations_conflict, spans_overlap, Conflict, ConflictKind, ConflictResolution};
pub use transform::{transform, Transformed};
