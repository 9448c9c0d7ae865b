//! Concurrent-conflict detection
//!
//! Two operations conflict iff they address the same (target, field), neither
//! happens-before the other, and their payloads collide: overlapping text
//! intervals, two field updates, or structural changes at the same position.

use cueline_core::{Operation, OperationId, OperationKind};
use serde::{Deserialize, Serialize};

/// What kind of collision was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Two text operations with overlapping intervals
    TextOverlap,
    /// Two field updates on the same cell
    FieldUpdate,
    /// Two structural operations at the same position
    Structural,
}

/// How a detected conflict was resolved by the transformer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// The transformed operation kept its effect
    LocalWins,
    /// The transformed operation yielded to the other
    RemoteWins,
    /// Both effects were combined into a synthetic result
    Merged,
    /// Left for the host to resolve
    Manual,
}

/// A detected conflict between two concurrent operations
///
/// Reported through `on_conflict_detected`; never fatal. The state after
/// resolution is always defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// What collided
    pub kind: ConflictKind,
    /// How the transformer resolved it
    pub resolution: ConflictResolution,
    /// The operation being transformed
    pub local: OperationId,
    /// The operation it was transformed against
    pub remote: OperationId,
    /// Human-readable description for the host's conflict surface
    pub description: String,
}

impl Conflict {
    pub(crate) fn new(
        kind: ConflictKind,
        resolution: ConflictResolution,
        local: &Operation,
        remote: &Operation,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            resolution,
            local: local.id.clone(),
            remote: remote.id.clone(),
            description: description.into(),
        }
    }
}

/// True if the half-open code-point intervals `[p, p+len)` intersect
pub fn spans_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
    let (a_start, a_len) = a;
    let (b_start, b_len) = b;
    a_start < b_start + b_len && b_start < a_start + a_len
}

/// The list position a structural operation acts on (moves use the source)
fn structural_position(op: &Operation) -> Option<i64> {
    match &op.kind {
        OperationKind::ItemInsert { position, .. } => Some(*position),
        OperationKind::ItemDelete { position, .. } => Some(*position),
        OperationKind::ItemMove { from_position, .. } => Some(*from_position),
        _ => None,
    }
}

/// The concurrent-conflict predicate
///
/// Same (target, field), concurrent vector clocks, and colliding payloads.
pub fn operations_conflict(a: &Operation, b: &Operation) -> bool {
    if !a.same_cell(b) || !a.concurrent_with(b) {
        return false;
    }

    if let (Some(span_a), Some(span_b)) = (a.text_span(), b.text_span()) {
        return spans_overlap(span_a, span_b);
    }

    if matches!(a.kind, OperationKind::FieldUpdate { .. })
        && matches!(b.kind, OperationKind::FieldUpdate { .. })
    {
        return true;
    }

    if let (Some(pos_a), Some(pos_b)) = (structural_position(a), structural_position(b)) {
        return pos_a == pos_b;
    }

    false
}
