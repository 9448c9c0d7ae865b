//! Pairwise operational transform
//!
//! `transform` rewrites one operation so it applies correctly after a
//! concurrent one. It is pure and idempotent: transforming an
//! already-transformed operation against the same op2 again yields the same
//! result. Operations on different cells, or causally ordered operations,
//! pass through unchanged.

use crate::conflict::{Conflict, ConflictKind, ConflictResolution};
use crate::structural::transform_structural;
use crate::text::transform_text;
use cueline_core::{
    EngineConfig, FieldConflictStrategy, FieldDataType, Operation, OperationId, OperationKind,
};
use tracing::debug;

/// Result of transforming `op1` against `op2`
#[derive(Debug, Clone)]
pub struct Transformed {
    /// The (possibly rewritten) operation
    pub operation: Operation,
    /// `op2`'s id when the transform precondition held, for the log's
    /// transformed-against set
    pub transformed_against: Option<OperationId>,
    /// A conflict record when the payloads truly collided
    pub conflict: Option<Conflict>,
}

/// Transform `op1` against a concurrent `op2`
///
/// Precondition: both operations target the same (target, field) and are
/// concurrent; otherwise `op1` is returned unchanged.
pub fn transform(op1: &Operation, op2: &Operation, config: &EngineConfig) -> Transformed {
    if !op1.same_cell(op2) || !op1.concurrent_with(op2) {
        return Transformed {
            operation: op1.clone(),
            transformed_against: None,
            conflict: None,
        };
    }

    let (kind, conflict) = if op1.kind.is_text() && op2.kind.is_text() {
        transform_text(op1, op2, config.text_conflicts)
    } else if op1.kind.is_structural() && op2.kind.is_structural() {
        transform_structural(op1, op2, config.structural_conflicts)
    } else if matches!(op1.kind, OperationKind::FieldUpdate { .. })
        && matches!(op2.kind, OperationKind::FieldUpdate { .. })
    {
        transform_field_update(op1, op2, config.field_conflicts)
    } else {
        // Mixed categories on one cell (e.g. text edit vs field overwrite)
        // have no positional relationship; the apply order decides.
        (op1.kind.clone(), None)
    };

    if let Some(conflict) = &conflict {
        debug!(
            target: "cueline::transform",
            kind = ?conflict.kind,
            resolution = ?conflict.resolution,
            "conflict resolved during transform"
        );
    }

    Transformed {
        operation: Operation {
            kind,
            ..op1.clone()
        },
        transformed_against: Some(op2.id.clone()),
        conflict,
    }
}

/// Concurrent field updates always conflict; resolution per config
///
/// With `prefer_latest` the losing update adopts the winner's value so both
/// replicas converge regardless of apply order.
fn transform_field_update(
    op1: &Operation,
    op2: &Operation,
    strategy: FieldConflictStrategy,
) -> (OperationKind, Option<Conflict>) {
    let (OperationKind::FieldUpdate {
        new_value, old_value, ..
    }, OperationKind::FieldUpdate {
        new_value: remote_new,
        ..
    }) = (&op1.kind, &op2.kind)
    else {
        return (op1.kind.clone(), None);
    };

    let description = format!("concurrent updates to {}.{}", op1.target, op1.field);
    match strategy {
        FieldConflictStrategy::PreferLatest => {
            if op2.is_later_than(op1) {
                let yielded = OperationKind::FieldUpdate {
                    new_value: remote_new.clone(),
                    old_value: new_value.clone(),
                    data_type: FieldDataType::of(remote_new),
                };
                (
                    yielded,
                    Some(Conflict::new(
                        ConflictKind::FieldUpdate,
                        ConflictResolution::RemoteWins,
                        op1,
                        op2,
                        description,
                    )),
                )
            } else {
                (
                    op1.kind.clone(),
                    Some(Conflict::new(
                        ConflictKind::FieldUpdate,
                        ConflictResolution::LocalWins,
                        op1,
                        op2,
                        description,
                    )),
                )
            }
        }
        FieldConflictStrategy::PreferLocal => (
            op1.kind.clone(),
            Some(Conflict::new(
                ConflictKind::FieldUpdate,
                ConflictResolution::LocalWins,
                op1,
                op2,
                description,
            )),
        ),
        FieldConflictStrategy::Manual => {
            let values = format!(
                "{description}: local {:?} vs remote {:?} (was {:?})",
                new_value, remote_new, old_value
            );
            (
                op1.kind.clone(),
                Some(Conflict::new(
                    ConflictKind::FieldUpdate,
                    ConflictResolution::Manual,
                    op1,
                    op2,
                    values,
                )),
            )
        }
    }
}
