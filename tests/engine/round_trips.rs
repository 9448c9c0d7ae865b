//! Round-trip laws: an operation followed by its inverse is the identity

use crate::common::{field_text, row_id_at, sample_document};
use cueline::{
    EngineConfig, FieldDataType, FieldValue, OpTarget, OperationKind, OtEngine, UserId,
    STRUCTURAL_FIELD,
};

#[test]
fn insert_then_delete_is_identity() {
    let mut document = sample_document(1);
    let row = row_id_at(&document, 0);
    document.rows[0].set_field("script", "stand by".into());
    let before = document.clone();

    let engine = OtEngine::new(document, EngineConfig::default());
    let user = UserId::from("u1");

    engine
        .submit_local(
            &user,
            OpTarget::Row(row),
            "script",
            OperationKind::TextInsert {
                position: 5,
                content: "-XY-".to_string(),
                length: 4,
            },
        )
        .unwrap();
    assert_eq!(field_text(&engine.document(), row, "script"), "stand-XY- by");

    engine
        .submit_local(
            &user,
            OpTarget::Row(row),
            "script",
            OperationKind::TextDelete {
                position: 5,
                length: 4,
                deleted_content: "-XY-".to_string(),
            },
        )
        .unwrap();

    assert_eq!(engine.document().rows, before.rows);
}

#[test]
fn move_there_and_back_is_identity() {
    let document = sample_document(4);
    let order_before: Vec<_> = document.rows.iter().map(|r| r.id).collect();
    let moved = row_id_at(&document, 3);

    let engine = OtEngine::new(document, EngineConfig::default());
    let user = UserId::from("u1");

    engine
        .submit_local(
            &user,
            OpTarget::Document,
            STRUCTURAL_FIELD,
            OperationKind::ItemMove {
                from_position: 3,
                to_position: 1,
                row_id: moved,
            },
        )
        .unwrap();
    assert_eq!(engine.document().rows[1].id, moved);

    engine
        .submit_local(
            &user,
            OpTarget::Document,
            STRUCTURAL_FIELD,
            OperationKind::ItemMove {
                from_position: 1,
                to_position: 3,
                row_id: moved,
            },
        )
        .unwrap();

    let order_after: Vec<_> = engine.document().rows.iter().map(|r| r.id).collect();
    assert_eq!(order_after, order_before);
}

#[test]
fn field_update_there_and_back_is_identity() {
    let mut document = sample_document(1);
    let row = row_id_at(&document, 0);
    document.rows[0].set_field("duration", FieldValue::Text("00:30".to_string()));
    let before = document.clone();

    let engine = OtEngine::new(document, EngineConfig::default());
    let user = UserId::from("u1");

    engine
        .submit_local(
            &user,
            OpTarget::Row(row),
            "duration",
            OperationKind::FieldUpdate {
                new_value: FieldValue::Text("00:45".to_string()),
                old_value: FieldValue::Text("00:30".to_string()),
                data_type: FieldDataType::String,
            },
        )
        .unwrap();

    engine
        .submit_local(
            &user,
            OpTarget::Row(row),
            "duration",
            OperationKind::FieldUpdate {
                new_value: FieldValue::Text("00:30".to_string()),
                old_value: FieldValue::Text("00:45".to_string()),
                data_type: FieldDataType::String,
            },
        )
        .unwrap();

    assert_eq!(engine.document().rows, before.rows);
}
