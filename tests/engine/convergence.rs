//! Replica convergence: same operations, any order, identical state

use crate::common::{field_text, insert_op, row_id_at, sample_document};
use cueline::{
    EngineConfig, FieldDataType, FieldValue, OpTarget, Operation, OperationKind, OtEngine, Row,
    UserId, VectorClock, STRUCTURAL_FIELD,
};

fn field_update(user: &str, timestamp: i64, target: OpTarget, field: &str, new: &str, old: &str) -> Operation {
    Operation::create(
        UserId::from(user),
        1,
        VectorClock::new(),
        target,
        field,
        timestamp,
        OperationKind::FieldUpdate {
            new_value: FieldValue::Text(new.to_string()),
            old_value: FieldValue::Text(old.to_string()),
            data_type: FieldDataType::String,
        },
    )
}

#[test]
fn text_inserts_converge_across_orders() {
    let document = sample_document(1);
    let row = row_id_at(&document, 0);
    let mut base = document.clone();
    base.rows[0].set_field("script", "hello".into());

    let site1 = OtEngine::new(base.clone(), EngineConfig::default());
    let site2 = OtEngine::new(base, EngineConfig::default());

    let a = insert_op("A", OpTarget::Row(row), "script", 0, "[A]", 100);
    let b = insert_op("B", OpTarget::Row(row), "script", 5, "[B]", 200);

    site1.submit(a.clone()).unwrap();
    site1.submit(b.clone()).unwrap();
    site2.submit(b).unwrap();
    site2.submit(a).unwrap();

    let one = field_text(&site1.document(), row, "script");
    let two = field_text(&site2.document(), row, "script");
    assert_eq!(one, two);
    assert_eq!(one, "[A]hello[B]");
}

#[test]
fn field_updates_converge_to_latest() {
    let document = sample_document(1);
    let row = row_id_at(&document, 0);

    let site1 = OtEngine::new(document.clone(), EngineConfig::default());
    let site2 = OtEngine::new(document, EngineConfig::default());

    let a = field_update("A", 100, OpTarget::Row(row), "duration", "00:45", "");
    let b = field_update("B", 200, OpTarget::Row(row), "duration", "01:30", "");

    site1.submit(a.clone()).unwrap();
    site1.submit(b.clone()).unwrap();
    site2.submit(b).unwrap();
    site2.submit(a).unwrap();

    let read = |engine: &OtEngine| {
        engine
            .document()
            .row(&row)
            .unwrap()
            .fields
            .get("duration")
            .cloned()
    };
    assert_eq!(read(&site1), read(&site2));
    assert_eq!(read(&site1), Some(FieldValue::Text("01:30".to_string())));
}

#[test]
fn structural_inserts_converge() {
    let document = sample_document(2);
    let site1 = OtEngine::new(document.clone(), EngineConfig::default());
    let site2 = OtEngine::new(document, EngineConfig::default());

    let row_a = Row::regular().with_field("name", "from A".into());
    let row_b = Row::header().with_field("name", "from B".into());
    let a = Operation::create(
        UserId::from("A"),
        1,
        VectorClock::new(),
        OpTarget::Document,
        STRUCTURAL_FIELD,
        100,
        OperationKind::ItemInsert {
            position: 0,
            row: row_a,
        },
    );
    let b = Operation::create(
        UserId::from("B"),
        1,
        VectorClock::new(),
        OpTarget::Document,
        STRUCTURAL_FIELD,
        200,
        OperationKind::ItemInsert {
            position: 2,
            row: row_b,
        },
    );

    site1.submit(a.clone()).unwrap();
    site1.submit(b.clone()).unwrap();
    site2.submit(b).unwrap();
    site2.submit(a).unwrap();

    let order1: Vec<_> = site1.document().rows.iter().map(|r| r.id).collect();
    let order2: Vec<_> = site2.document().rows.iter().map(|r| r.id).collect();
    assert_eq!(order1, order2);
    assert_eq!(order1.len(), 4);
}

#[test]
fn causally_ordered_ops_do_not_transform() {
    // A second op that has seen the first applies verbatim
    let document = sample_document(1);
    let row = row_id_at(&document, 0);
    let engine = OtEngine::new(document, EngineConfig::default());
    let user = UserId::from("A");

    let first = insert_op("A", OpTarget::Row(row), "script", 0, "abc", 100);
    engine.submit(first).unwrap();

    let (sequence, clock) = engine.operation_basis(&user);
    assert_eq!(sequence, 2);
    let second = Operation::create(
        user,
        sequence,
        clock,
        OpTarget::Row(row),
        "script",
        200,
        OperationKind::TextInsert {
            position: 3,
            content: "def".to_string(),
            length: 3,
        },
    );
    let outcome = engine.submit(second).unwrap();
    assert!(outcome.conflicts.is_empty());
    assert_eq!(field_text(&engine.document(), row, "script"), "abcdef");
}
