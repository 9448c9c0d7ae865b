//! Pairwise transform scenarios

use crate::common::{insert_op, replace_op, sample_document, row_id_at};
use cueline::{
    transform, transform_against_all, ConflictResolution, EngineConfig, OpTarget, Operation,
    OperationKind, Row, RowId, UserId, VectorClock, STRUCTURAL_FIELD,
};

fn structural(user: &str, timestamp: i64, kind: OperationKind) -> Operation {
    Operation::create(
        UserId::from(user),
        1,
        VectorClock::new(),
        OpTarget::Document,
        STRUCTURAL_FIELD,
        timestamp,
        kind,
    )
}

// ============================================================================
// Empty concurrent set
// ============================================================================

#[test]
fn transform_against_nothing_returns_op_unchanged() {
    let document = sample_document(1);
    let row = row_id_at(&document, 0);
    let op = insert_op("u1", OpTarget::Row(row), "script", 0, "abc", 100);

    let result = transform_against_all(&op, &[], &EngineConfig::default());
    assert_eq!(result.operation, op);
    assert!(result.conflicts.is_empty());
    assert!(result.transformed_against.is_empty());
}

// ============================================================================
// Two-user concurrent inserts
// ============================================================================

#[test]
fn concurrent_inserts_keep_both_edits() {
    // Field value "hello": A inserts "[A]" at 0, B inserts "[B]" at 5
    let document = sample_document(1);
    let row = row_id_at(&document, 0);
    let a = insert_op("A", OpTarget::Row(row), "script", 0, "[A]", 100);
    let b = insert_op("B", OpTarget::Row(row), "script", 5, "[B]", 200);

    // B transformed against A shifts right by A's length
    let result = transform(&b, &a, &EngineConfig::default());
    match result.operation.kind {
        OperationKind::TextInsert { position, .. } => assert_eq!(position, 8),
        _ => panic!("expected insert"),
    }

    // A transformed against B stays put
    let result = transform(&a, &b, &EngineConfig::default());
    match result.operation.kind {
        OperationKind::TextInsert { position, .. } => assert_eq!(position, 0),
        _ => panic!("expected insert"),
    }
}

// ============================================================================
// Overlapping replacements
// ============================================================================

#[test]
fn overlapping_replace_later_wins_earlier_cancelled() {
    // Field value "abcdef": A replaces "bcd"→"XYZ" at ts 100,
    // B replaces "cd"→"QQ" at ts 200; prefer_latest means B wins
    let document = sample_document(1);
    let row = row_id_at(&document, 0);
    let a = replace_op("A", OpTarget::Row(row), "script", 1, "bcd", "XYZ", 100);
    let b = replace_op("B", OpTarget::Row(row), "script", 2, "cd", "QQ", 200);

    let result = transform(&a, &b, &EngineConfig::default());
    let conflict = result.conflict.expect("overlap reports a conflict");
    assert_eq!(conflict.resolution, ConflictResolution::RemoteWins);
    assert!(result.operation.is_noop());

    let result = transform(&b, &a, &EngineConfig::default());
    assert_eq!(
        result.conflict.unwrap().resolution,
        ConflictResolution::LocalWins
    );
    // The winner overrides the loser's applied range so replicas agree
    match result.operation.kind {
        OperationKind::TextReplace {
            position,
            new_content,
            ..
        } => {
            assert_eq!(position, 1);
            assert_eq!(new_content, "bQQ");
        }
        _ => panic!("expected replace"),
    }
}

// ============================================================================
// Concurrent move and delete of the same row
// ============================================================================

#[test]
fn move_of_deleted_row_cancels() {
    let document = sample_document(3);
    let moved = document.rows[2].clone();

    let a = structural(
        "A",
        100,
        OperationKind::ItemMove {
            from_position: 2,
            to_position: 0,
            row_id: moved.id,
        },
    );
    let b = structural(
        "B",
        200,
        OperationKind::ItemDelete {
            position: 2,
            deleted_row: moved,
        },
    );

    // The move cancels: its row is gone
    let result = transform(&a, &b, &EngineConfig::default());
    assert!(result.operation.is_noop());
    assert_eq!(
        result.conflict.unwrap().resolution,
        ConflictResolution::RemoteWins
    );

    // The delete survives, tracking the row's position
    let result = transform(&b, &a, &EngineConfig::default());
    match result.operation.kind {
        OperationKind::ItemDelete { position, .. } => assert_eq!(position, 0),
        _ => panic!("expected delete"),
    }
}

// ============================================================================
// Batch folds in server order
// ============================================================================

#[test]
fn batch_fold_accumulates_in_order() {
    let document = sample_document(1);
    let row = row_id_at(&document, 0);
    let op = insert_op("C", OpTarget::Row(row), "script", 4, "X", 300);
    let first = insert_op("A", OpTarget::Row(row), "script", 0, "aa", 100);
    let second = insert_op("B", OpTarget::Row(row), "script", 1, "b", 200);

    let result = transform_against_all(&op, &[&first, &second], &EngineConfig::default());
    match result.operation.kind {
        OperationKind::TextInsert { position, .. } => assert_eq!(position, 7),
        _ => panic!("expected insert"),
    }
    assert_eq!(result.transformed_against.len(), 2);
}

// ============================================================================
// Structural inserts at equal positions
// ============================================================================

#[test]
fn concurrent_item_inserts_at_same_position_both_survive() {
    let a = structural(
        "A",
        100,
        OperationKind::ItemInsert {
            position: 1,
            row: Row::regular(),
        },
    );
    let b = structural(
        "B",
        200,
        OperationKind::ItemInsert {
            position: 1,
            row: Row::header(),
        },
    );

    let result = transform(&a, &b, &EngineConfig::default());
    match result.operation.kind {
        OperationKind::ItemInsert { position, .. } => assert_eq!(position, 2),
        _ => panic!("expected insert"),
    }
}

// ============================================================================
// Different rows never interact
// ============================================================================

#[test]
fn ops_on_different_rows_pass_through() {
    let a = insert_op("A", OpTarget::Row(RowId::new()), "script", 0, "x", 100);
    let b = insert_op("B", OpTarget::Row(RowId::new()), "script", 0, "y", 200);

    let result = transform(&a, &b, &EngineConfig::default());
    assert_eq!(result.operation, a);
    assert!(result.transformed_against.is_none());
}
