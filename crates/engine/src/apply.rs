//! Apply rules: fold one transformed operation into the document
//!
//! Text operations splice by code points and treat a missing value as the
//! empty string. Structural no-ops (position `-1`, `from == to`) succeed
//! without touching the document. Anything that no longer makes sense after
//! transformation (missing row, out-of-bounds index) fails with an apply
//! error and leaves the document untouched.

use cueline_core::{
    CuelineError, Document, FieldValue, OpTarget, Operation, OperationKind, Result,
    DOCUMENT_TEXT_FIELDS,
};

/// Splice a code-point range out of `value` and insert `insert` in its place
fn splice_text(value: &str, position: usize, remove: usize, insert: &str) -> Option<String> {
    let chars: Vec<char> = value.chars().collect();
    if position > chars.len() || position + remove > chars.len() {
        return None;
    }
    let mut out: String = chars[..position].iter().collect();
    out.push_str(insert);
    out.extend(chars[position + remove..].iter());
    Some(out)
}

/// Read the current text of the field an operation addresses
fn current_text(document: &Document, op: &Operation) -> Result<String> {
    match &op.target {
        OpTarget::Document => {
            if !DOCUMENT_TEXT_FIELDS.contains(&op.field.as_str()) {
                return Err(CuelineError::apply_failed(
                    op.target.to_string(),
                    &op.field,
                    "not a document text field",
                ));
            }
            Ok(document
                .document_text(&op.field)
                .unwrap_or_default()
                .to_string())
        }
        OpTarget::Row(row_id) => {
            let row = document
                .row(row_id)
                .ok_or_else(|| CuelineError::row_not_found(row_id))?;
            match row.fields.get(&op.field) {
                None => Ok(String::new()),
                Some(FieldValue::Text(s)) => Ok(s.clone()),
                Some(_) => Err(CuelineError::apply_failed(
                    op.target.to_string(),
                    &op.field,
                    "field holds a non-text value",
                )),
            }
        }
    }
}

/// Write back the new text of the field an operation addresses
fn store_text(document: &mut Document, op: &Operation, value: String) -> Result<()> {
    match &op.target {
        OpTarget::Document => {
            document.set_document_text(&op.field, value);
            Ok(())
        }
        OpTarget::Row(row_id) => {
            let row = document
                .row_mut(row_id)
                .ok_or_else(|| CuelineError::row_not_found(row_id))?;
            row.set_field(op.field.clone(), FieldValue::Text(value));
            Ok(())
        }
    }
}

/// Overwrite a document-level scalar field
fn apply_document_field_update(
    document: &mut Document,
    field: &str,
    value: &FieldValue,
) -> Result<()> {
    match field {
        "title" | "externalNotes" => {
            let text = value
                .as_text()
                .ok_or_else(|| {
                    CuelineError::apply_failed("rundown", field, "expected a text value")
                })?
                .to_string();
            document.set_document_text(field, text);
            Ok(())
        }
        "startTime" => {
            document.start_time = value.as_text().map(str::to_string);
            Ok(())
        }
        "timezone" => {
            document.timezone = value.as_text().map(str::to_string);
            Ok(())
        }
        "showDate" => {
            document.show_date = match value.as_text() {
                Some(s) => Some(s.parse().map_err(|_| {
                    CuelineError::apply_failed("rundown", field, "invalid calendar date")
                })?),
                None => None,
            };
            Ok(())
        }
        _ => Err(CuelineError::apply_failed(
            "rundown",
            field,
            "unknown document field",
        )),
    }
}

/// Apply one transformed operation to the document
pub fn apply_operation(document: &mut Document, op: &Operation) -> Result<()> {
    match &op.kind {
        OperationKind::TextInsert {
            position, content, ..
        } => {
            if content.is_empty() {
                return Ok(());
            }
            let value = current_text(document, op)?;
            let next = splice_text(&value, *position, 0, content).ok_or_else(|| {
                CuelineError::apply_failed(
                    op.target.to_string(),
                    &op.field,
                    format!("insert position {position} out of bounds"),
                )
            })?;
            store_text(document, op, next)
        }
        OperationKind::TextDelete {
            position, length, ..
        } => {
            if *length == 0 {
                return Ok(());
            }
            let value = current_text(document, op)?;
            let next = splice_text(&value, *position, *length, "").ok_or_else(|| {
                CuelineError::apply_failed(
                    op.target.to_string(),
                    &op.field,
                    format!("delete range {position}+{length} out of bounds"),
                )
            })?;
            store_text(document, op, next)
        }
        OperationKind::TextReplace {
            position,
            length,
            new_content,
            ..
        } => {
            if *length == 0 && new_content.is_empty() {
                return Ok(());
            }
            let value = current_text(document, op)?;
            let available = value.chars().count().saturating_sub(*position);
            let remove = (*length).min(available);
            let next = splice_text(&value, *position, remove, new_content).ok_or_else(|| {
                CuelineError::apply_failed(
                    op.target.to_string(),
                    &op.field,
                    format!("replace position {position} out of bounds"),
                )
            })?;
            store_text(document, op, next)
        }
        OperationKind::FieldUpdate { new_value, .. } => match &op.target {
            OpTarget::Document => apply_document_field_update(document, &op.field, new_value),
            OpTarget::Row(row_id) => {
                let row = document
                    .row_mut(row_id)
                    .ok_or_else(|| CuelineError::row_not_found(row_id))?;
                row.set_field(op.field.clone(), new_value.clone());
                Ok(())
            }
        },
        OperationKind::ItemInsert { position, row } => {
            if *position < 0 {
                return Ok(());
            }
            document.insert_row(*position as usize, row.clone());
            Ok(())
        }
        OperationKind::ItemDelete { position, .. } => {
            if *position < 0 {
                return Ok(());
            }
            document.remove_row(*position as usize).map(|_| ()).ok_or_else(|| {
                CuelineError::apply_failed(
                    "rundown",
                    &op.field,
                    format!("delete position {position} out of bounds"),
                )
            })
        }
        OperationKind::ItemMove {
            from_position,
            to_position,
            row_id,
        } => {
            if from_position == to_position {
                return Ok(());
            }
            let from = *from_position as usize;
            // Trust the transformed index when it still names the right row;
            // fall back to a lookup when concurrent edits shifted it.
            let actual_from = if document.rows.get(from).map(|r| r.id) == Some(*row_id) {
                from
            } else {
                document
                    .row_position(row_id)
                    .ok_or_else(|| CuelineError::row_not_found(row_id))?
            };
            document.move_row(actual_from, *to_position as usize);
            Ok(())
        }
    }
}
