//! Batch transform: fold one operation through a server-ordered sequence
//!
//! The engine invokes these with the concurrent set already in server-log
//! order, so every client folds in the same order and replicas converge.

use crate::conflict::Conflict;
use crate::transform::{transform, Transformed};
use cueline_core::{EngineConfig, Operation, OperationId};

/// Result of folding an operation through a concurrent sequence
#[derive(Debug, Clone)]
pub struct BatchTransformed {
    /// The fully transformed operation
    pub operation: Operation,
    /// Every operation id the fold actually transformed against
    pub transformed_against: Vec<OperationId>,
    /// Conflicts collected along the way
    pub conflicts: Vec<Conflict>,
}

/// Transform `op` against each member of `against`, in order
pub fn transform_against_all(
    op: &Operation,
    against: &[&Operation],
    config: &EngineConfig,
) -> BatchTransformed {
    let mut current = op.clone();
    let mut transformed_against = Vec::new();
    let mut conflicts = Vec::new();

    for other in against {
        let Transformed {
            operation,
            transformed_against: against_id,
            conflict,
        } = transform(&current, other, config);
        current = operation;
        if let Some(id) = against_id {
            transformed_against.push(id);
        }
        if let Some(conflict) = conflict {
            conflicts.push(conflict);
        }
    }

    BatchTransformed {
        operation: current,
        transformed_against,
        conflicts,
    }
}

/// Transform a sequence `[a1, a2, …]` against `[b1, b2, …]`
///
/// Each `ai` folds through every `bj` in order; conflicts accumulate across
/// the whole batch.
pub fn transform_batch(
    ops: &[Operation],
    against: &[Operation],
    config: &EngineConfig,
) -> (Vec<Operation>, Vec<Conflict>) {
    let refs: Vec<&Operation> = against.iter().collect();
    let mut out = Vec::with_capacity(ops.len());
    let mut conflicts = Vec::new();

    for op in ops {
        let result = transform_against_all(op, &refs, config);
        out.push(result.operation);
        conflicts.extend(result.conflicts);
    }

    (out, conflicts)
}
