//! Transform rules for structural (row-list) operations
//!
//! Structural positions are signed list indices; `-1` is the no-op sentinel
//! a transform produces when the other operation made this one meaningless
//! (row already deleted, same-row move lost). A move whose row was deleted
//! concurrently is always cancelled.

use crate::conflict::{Conflict, ConflictKind, ConflictResolution};
use cueline_core::{Operation, OperationKind, StructuralConflictStrategy};

/// Transform a structural operation against a concurrent structural
/// operation
///
/// Callers guarantee both operations target the document's row list and are
/// concurrent.
pub(crate) fn transform_structural(
    op1: &Operation,
    op2: &Operation,
    strategy: StructuralConflictStrategy,
) -> (OperationKind, Option<Conflict>) {
    use OperationKind::*;

    match (&op1.kind, &op2.kind) {
        (ItemInsert { .. }, ItemInsert { .. }) => (insert_vs_insert(op1, op2), None),
        (ItemInsert { .. }, ItemDelete { .. }) => (insert_vs_delete(op1, op2), None),
        (ItemInsert { .. }, ItemMove { .. }) => (insert_vs_move(op1, op2), None),
        (ItemDelete { .. }, ItemInsert { .. }) => (delete_vs_insert(op1, op2), None),
        (ItemDelete { .. }, ItemDelete { .. }) => delete_vs_delete(op1, op2, strategy),
        (ItemDelete { .. }, ItemMove { .. }) => (delete_vs_move(op1, op2), None),
        (ItemMove { .. }, ItemInsert { .. }) => (move_vs_insert(op1, op2), None),
        (ItemMove { .. }, ItemDelete { .. }) => move_vs_delete(op1, op2),
        (ItemMove { .. }, ItemMove { .. }) => move_vs_move(op1, op2, strategy),
        _ => (op1.kind.clone(), None),
    }
}

fn insert_vs_insert(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::ItemInsert { position, row }, OperationKind::ItemInsert {
        position: p2, ..
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let shifted = if *p2 <= *position && *position >= 0 {
        position + 1
    } else {
        *position
    };
    OperationKind::ItemInsert {
        position: shifted,
        row: row.clone(),
    }
}

fn insert_vs_delete(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::ItemInsert { position, row }, OperationKind::ItemDelete {
        position: p2, ..
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let shifted = if *p2 < *position { position - 1 } else { *position };
    OperationKind::ItemInsert {
        position: shifted,
        row: row.clone(),
    }
}

fn insert_vs_move(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::ItemInsert { position, row }, OperationKind::ItemMove {
        from_position,
        to_position,
        ..
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let mut position = *position;
    if *from_position < position {
        position -= 1;
    }
    if *to_position <= position {
        position += 1;
    }
    OperationKind::ItemInsert {
        position,
        row: row.clone(),
    }
}

fn delete_vs_insert(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::ItemDelete {
        position,
        deleted_row,
    }, OperationKind::ItemInsert { position: p2, .. }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let shifted = if *p2 <= *position && *position >= 0 {
        position + 1
    } else {
        *position
    };
    OperationKind::ItemDelete {
        position: shifted,
        deleted_row: deleted_row.clone(),
    }
}

fn delete_vs_delete(
    op1: &Operation,
    op2: &Operation,
    strategy: StructuralConflictStrategy,
) -> (OperationKind, Option<Conflict>) {
    let (OperationKind::ItemDelete {
        position,
        deleted_row,
    }, OperationKind::ItemDelete { position: p2, .. }) = (&op1.kind, &op2.kind)
    else {
        return (op1.kind.clone(), None);
    };

    if position == p2 {
        // Same row already deleted by op2
        if strategy == StructuralConflictStrategy::Manual {
            let conflict = Conflict::new(
                ConflictKind::Structural,
                ConflictResolution::Manual,
                op1,
                op2,
                format!("concurrent deletes at row position {position}"),
            );
            return (op1.kind.clone(), Some(conflict));
        }
        let conflict = Conflict::new(
            ConflictKind::Structural,
            ConflictResolution::RemoteWins,
            op1,
            op2,
            format!("concurrent deletes at row position {position}"),
        );
        return (
            OperationKind::ItemDelete {
                position: -1,
                deleted_row: deleted_row.clone(),
            },
            Some(conflict),
        );
    }

    let shifted = if *p2 < *position { position - 1 } else { *position };
    (
        OperationKind::ItemDelete {
            position: shifted,
            deleted_row: deleted_row.clone(),
        },
        None,
    )
}

fn delete_vs_move(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::ItemDelete {
        position,
        deleted_row,
    }, OperationKind::ItemMove {
        from_position,
        to_position,
        ..
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };

    // The delete follows its row wherever the move put it
    let mut position = *position;
    if position == *from_position {
        position = *to_position;
    } else {
        if *from_position < position {
            position -= 1;
        }
        if *to_position <= position {
            position += 1;
        }
    }
    OperationKind::ItemDelete {
        position,
        deleted_row: deleted_row.clone(),
    }
}

fn move_vs_insert(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::ItemMove {
        from_position,
        to_position,
        row_id,
    }, OperationKind::ItemInsert { position: p2, .. }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let mut from = *from_position;
    let mut to = *to_position;
    if *p2 <= from {
        from += 1;
    }
    if *p2 <= to {
        to += 1;
    }
    OperationKind::ItemMove {
        from_position: from,
        to_position: to,
        row_id: *row_id,
    }
}

fn move_vs_delete(op1: &Operation, op2: &Operation) -> (OperationKind, Option<Conflict>) {
    let (OperationKind::ItemMove {
        from_position,
        to_position,
        row_id,
    }, OperationKind::ItemDelete {
        position: p2,
        deleted_row,
    }) = (&op1.kind, &op2.kind)
    else {
        return (op1.kind.clone(), None);
    };

    // Deleting the moved row cancels the move
    if deleted_row.id == *row_id || *p2 == *from_position {
        let conflict = Conflict::new(
            ConflictKind::Structural,
            ConflictResolution::RemoteWins,
            op1,
            op2,
            format!("moved row {row_id} was deleted concurrently"),
        );
        let cancelled = OperationKind::ItemMove {
            from_position: *from_position,
            to_position: *from_position,
            row_id: *row_id,
        };
        return (cancelled, Some(conflict));
    }

    let mut from = *from_position;
    let mut to = *to_position;
    if *p2 < from {
        from -= 1;
    }
    if *p2 < to {
        to -= 1;
    }
    (
        OperationKind::ItemMove {
            from_position: from,
            to_position: to,
            row_id: *row_id,
        },
        None,
    )
}

fn move_vs_move(
    op1: &Operation,
    op2: &Operation,
    strategy: StructuralConflictStrategy,
) -> (OperationKind, Option<Conflict>) {
    let (OperationKind::ItemMove {
        from_position,
        to_position,
        row_id,
    }, OperationKind::ItemMove {
        from_position: from2,
        to_position: to2,
        row_id: row2,
    }) = (&op1.kind, &op2.kind)
    else {
        return (op1.kind.clone(), None);
    };

    if row_id == row2 {
        // Both moved the same row: later timestamp wins
        if strategy == StructuralConflictStrategy::Manual {
            let conflict = Conflict::new(
                ConflictKind::Structural,
                ConflictResolution::Manual,
                op1,
                op2,
                format!("row {row_id} moved concurrently by two users"),
            );
            return (op1.kind.clone(), Some(conflict));
        }
        if op2.is_later_than(op1) {
            let conflict = Conflict::new(
                ConflictKind::Structural,
                ConflictResolution::RemoteWins,
                op1,
                op2,
                format!("row {row_id} moved concurrently by two users"),
            );
            let cancelled = OperationKind::ItemMove {
                from_position: *from_position,
                to_position: *from_position,
                row_id: *row_id,
            };
            return (cancelled, Some(conflict));
        }
        let conflict = Conflict::new(
            ConflictKind::Structural,
            ConflictResolution::LocalWins,
            op1,
            op2,
            format!("row {row_id} moved concurrently by two users"),
        );
        return (op1.kind.clone(), Some(conflict));
    }

    // Different rows: adjust both endpoints through op2's removal and
    // reinsertion
    let mut from = *from_position;
    let mut to = *to_position;
    if *from2 < from {
        from -= 1;
    }
    if *from2 < to {
        to -= 1;
    }
    if *to2 <= from {
        from += 1;
    }
    if *to2 <= to {
        to += 1;
    }
    (
        OperationKind::ItemMove {
            from_position: from,
            to_position: to,
            row_id: *row_id,
        },
        None,
    )
}
