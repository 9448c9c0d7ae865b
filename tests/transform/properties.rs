//! Convergence properties over arbitrary concurrent text pairs
//!
//! For any base value and any two concurrent text operations on it, applying
//! them through the engine in either order must yield identical state.

use crate::common::sample_document;
use cueline::{
    Document, EngineConfig, OpTarget, Operation, OperationKind, OtEngine, RowId, UserId,
    VectorClock,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum TextOpSpec {
    Insert {
        position: usize,
        content: String,
    },
    Delete {
        position: usize,
        length: usize,
    },
    Replace {
        position: usize,
        length: usize,
        new_content: String,
    },
}

fn op_spec(len: usize) -> BoxedStrategy<TextOpSpec> {
    let insert = (0..=len, "[x-z]{1,3}")
        .prop_map(|(position, content)| TextOpSpec::Insert { position, content });
    if len == 0 {
        insert.boxed()
    } else {
        let delete = (0..len)
            .prop_flat_map(move |position| (Just(position), 1..=len - position))
            .prop_map(|(position, length)| TextOpSpec::Delete { position, length });
        let replace = (0..len)
            .prop_flat_map(move |position| (Just(position), 1..=len - position, "[A-C]{0,3}"))
            .prop_map(|(position, length, new_content)| TextOpSpec::Replace {
                position,
                length,
                new_content,
            });
        prop_oneof![insert, delete, replace].boxed()
    }
}

fn scenario() -> impl Strategy<Value = (String, TextOpSpec, TextOpSpec)> {
    "[a-h]{0,10}".prop_flat_map(|base| {
        let len = base.chars().count();
        (Just(base), op_spec(len), op_spec(len))
    })
}

fn build_op(
    spec: &TextOpSpec,
    base: &str,
    user: &str,
    timestamp: i64,
    row: RowId,
) -> Operation {
    let substr =
        |p: usize, l: usize| -> String { base.chars().skip(p).take(l).collect() };
    let kind = match spec {
        TextOpSpec::Insert { position, content } => OperationKind::TextInsert {
            position: *position,
            content: content.clone(),
            length: content.chars().count(),
        },
        TextOpSpec::Delete { position, length } => OperationKind::TextDelete {
            position: *position,
            length: *length,
            deleted_content: substr(*position, *length),
        },
        TextOpSpec::Replace {
            position,
            length,
            new_content,
        } => OperationKind::TextReplace {
            position: *position,
            length: *length,
            new_content: new_content.clone(),
            old_content: substr(*position, *length),
        },
    };
    Operation::create(
        UserId::from(user),
        1,
        VectorClock::new(),
        OpTarget::Row(row),
        "script",
        timestamp,
        kind,
    )
}

fn document_with_script(base: &str) -> (Document, RowId) {
    let mut document = sample_document(1);
    let row = document.rows[0].id;
    document.rows[0].set_field("script", base.into());
    (document, row)
}

fn script_after(engine: &OtEngine, row: RowId) -> String {
    engine
        .document()
        .row(&row)
        .map(|r| r.text("script").to_string())
        .unwrap_or_default()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn concurrent_text_pairs_converge((base, a, b) in scenario()) {
        let (document, row) = document_with_script(&base);
        let site1 = OtEngine::new(document.clone(), EngineConfig::default());
        let site2 = OtEngine::new(document, EngineConfig::default());

        let op_a = build_op(&a, &base, "alice", 100, row);
        let op_b = build_op(&b, &base, "bob", 200, row);

        site1.submit(op_a.clone()).unwrap();
        site1.submit(op_b.clone()).unwrap();

        site2.submit(op_b).unwrap();
        site2.submit(op_a).unwrap();

        prop_assert_eq!(script_after(&site1, row), script_after(&site2, row));
    }

    #[test]
    fn transform_is_pure((base, a, b) in scenario()) {
        let (_, row) = document_with_script(&base);
        let op_a = build_op(&a, &base, "alice", 100, row);
        let op_b = build_op(&b, &base, "bob", 200, row);
        let config = EngineConfig::default();

        // No hidden state: the same inputs always produce the same output
        let first = cueline::transform(&op_a, &op_b, &config);
        let second = cueline::transform(&op_a, &op_b, &config);
        prop_assert_eq!(first.operation, second.operation);
        prop_assert_eq!(first.conflict.is_some(), second.conflict.is_some());
    }
}
