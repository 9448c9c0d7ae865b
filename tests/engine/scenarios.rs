//! End-to-end concurrent-editing scenarios

use crate::common::{field_text, insert_op, replace_op, row_id_at, sample_document};
use cueline::{
    EngineConfig, OpTarget, Operation, OperationKind, OtEngine, SessionId, UserId, VectorClock,
    STRUCTURAL_FIELD,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Two-user concurrent inserts
// ============================================================================

#[test]
fn two_user_concurrent_inserts() {
    let mut document = sample_document(1);
    let row = row_id_at(&document, 0);
    document.rows[0].set_field("script", "hello".into());

    let engine = OtEngine::new(document, EngineConfig::default());
    engine
        .submit(insert_op("A", OpTarget::Row(row), "script", 0, "[A]", 100))
        .unwrap();
    engine
        .submit(insert_op("B", OpTarget::Row(row), "script", 5, "[B]", 200))
        .unwrap();

    assert_eq!(field_text(&engine.document(), row, "script"), "[A]hello[B]");
}

// ============================================================================
// Overlapping replace: later wins, earlier cancelled
// ============================================================================

#[test]
fn overlapping_replace_prefers_latest() {
    let mut document = sample_document(1);
    let row = row_id_at(&document, 0);
    document.rows[0].set_field("script", "abcdef".into());

    let engine = OtEngine::new(document, EngineConfig::default());
    let conflicts = Arc::new(AtomicUsize::new(0));
    {
        let conflicts = conflicts.clone();
        engine.set_on_conflict_detected(Box::new(move |_| {
            conflicts.fetch_add(1, Ordering::SeqCst);
        }));
    }

    engine
        .submit(replace_op("A", OpTarget::Row(row), "script", 1, "bcd", "XYZ", 100))
        .unwrap();
    engine
        .submit(replace_op("B", OpTarget::Row(row), "script", 2, "cd", "QQ", 200))
        .unwrap();

    assert_eq!(field_text(&engine.document(), row, "script"), "abQQef");
    assert_eq!(conflicts.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Concurrent move and delete of the same row
// ============================================================================

#[test]
fn move_and_delete_of_same_row() {
    let document = sample_document(3);
    let kept: Vec<_> = document.rows[..2].iter().map(|r| r.id).collect();
    let victim = document.rows[2].clone();

    let site1 = OtEngine::new(document.clone(), EngineConfig::default());
    let site2 = OtEngine::new(document, EngineConfig::default());

    let move_op = Operation::create(
        UserId::from("A"),
        1,
        VectorClock::new(),
        OpTarget::Document,
        STRUCTURAL_FIELD,
        100,
        OperationKind::ItemMove {
            from_position: 2,
            to_position: 0,
            row_id: victim.id,
        },
    );
    let delete_op = Operation::create(
        UserId::from("B"),
        1,
        VectorClock::new(),
        OpTarget::Document,
        STRUCTURAL_FIELD,
        200,
        OperationKind::ItemDelete {
            position: 2,
            deleted_row: victim,
        },
    );

    site1.submit(move_op.clone()).unwrap();
    site1.submit(delete_op.clone()).unwrap();
    site2.submit(delete_op).unwrap();
    site2.submit(move_op).unwrap();

    for site in [&site1, &site2] {
        let order: Vec<_> = site.document().rows.iter().map(|r| r.id).collect();
        assert_eq!(order, kept, "the move cancels and the delete applies");
    }
}

// ============================================================================
// Advisory edit sessions
// ============================================================================

#[test]
fn edit_sessions_track_presence_without_blocking() {
    let document = sample_document(1);
    let row = row_id_at(&document, 0);
    let engine = OtEngine::new(document, EngineConfig::default());

    let session: SessionId = engine.start_edit_session(
        UserId::from("A"),
        OpTarget::Row(row),
        "script",
        Some("dra".to_string()),
    );

    assert!(engine.is_field_being_edited(&OpTarget::Row(row), "script", None));
    assert!(!engine.is_field_being_edited(
        &OpTarget::Row(row),
        "script",
        Some(&UserId::from("A"))
    ));

    // The soft lock never blocks another user's write
    engine
        .submit(insert_op("B", OpTarget::Row(row), "script", 0, "x", 100))
        .unwrap();

    assert!(engine.update_session_activity(&session, Some("draf".to_string())));
    let ended = engine.end_edit_session(&session).unwrap();
    assert_eq!(ended.current_value.as_deref(), Some("draf"));
    assert!(!engine.is_field_being_edited(&OpTarget::Row(row), "script", None));
}

// ============================================================================
// Snapshot shape
// ============================================================================

#[test]
fn snapshot_reflects_log_and_sessions() {
    let document = sample_document(1);
    let row = row_id_at(&document, 0);
    let engine = OtEngine::new(document, EngineConfig::default());

    engine
        .submit(insert_op("A", OpTarget::Row(row), "script", 0, "x", 100))
        .unwrap();
    engine.start_edit_session(UserId::from("B"), OpTarget::Row(row), "notes", None);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.operations.len(), 1);
    assert_eq!(snapshot.active_sessions.len(), 1);
    assert_eq!(snapshot.vector_clock.get(&UserId::from("A")), 1);
    assert_eq!(field_text(&snapshot.data, row, "script"), "x");
}
