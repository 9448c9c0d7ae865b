//! Signature stability across excluded-field permutations

use crate::common::sample_document;
use cueline::{content_signature, lightweight_signature, ColumnSpec, FieldValue};

#[test]
fn signature_ignores_columns_timezone_and_showcaller_state() {
    let base = sample_document(3);

    // Variant a: different column widths and order
    let mut with_columns = base.clone();
    with_columns.columns = vec![
        ColumnSpec {
            key: "notes".to_string(),
            label: "Notes".to_string(),
            width: Some(120),
            visible: true,
        },
        ColumnSpec {
            key: "script".to_string(),
            label: "Script".to_string(),
            width: None,
            visible: false,
        },
    ];

    // Variant b: different timezone and start time
    let mut with_timezone = base.clone();
    with_timezone.timezone = Some("Europe/London".to_string());
    with_timezone.start_time = Some("18:00:00".to_string());

    // Variant c: non-zero showcaller elapsed on every row
    let mut with_showcaller = base.clone();
    for row in &mut with_showcaller.rows {
        row.set_field("showcallerElapsed", FieldValue::Number(17.5));
        row.set_field("showcallerState", FieldValue::Text("playing".to_string()));
    }

    let expected = content_signature(&base);
    assert_eq!(content_signature(&with_columns), expected);
    assert_eq!(content_signature(&with_timezone), expected);
    assert_eq!(content_signature(&with_showcaller), expected);

    // A single renamed row breaks the equality
    let mut renamed = base.clone();
    renamed.rows[1].set_field("name", "renamed".into());
    assert_ne!(content_signature(&renamed), expected);
}

#[test]
fn lightweight_signature_is_advisory_only() {
    let base = sample_document(2);

    // Content-level change invisible to the lightweight variant
    let mut scripted = base.clone();
    scripted.rows[0].set_field("script", "new script".into());
    assert_eq!(lightweight_signature(&scripted), lightweight_signature(&base));
    assert_ne!(content_signature(&scripted), content_signature(&base));

    // Row-count change is visible
    let mut shorter = base.clone();
    shorter.rows.pop();
    assert_ne!(lightweight_signature(&shorter), lightweight_signature(&base));
}

#[test]
fn signature_is_stable_across_clone_and_serde() {
    let base = sample_document(2);
    let json = serde_json::to_string(&base).unwrap();
    let back: cueline::Document = serde_json::from_str(&json).unwrap();
    assert_eq!(content_signature(&back), content_signature(&base));
}
