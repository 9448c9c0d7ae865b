//! Transform rules for text operations
//!
//! All positions are code-point indices into the field's current value.
//! Insert/insert ties break by user id so both sides order the inserts the
//! same way; overlapping replacements are the only text case that produces a
//! reportable conflict.

use crate::conflict::{spans_overlap, Conflict, ConflictKind, ConflictResolution};
use cueline_core::{code_point_len, Operation, OperationKind, TextConflictStrategy};

/// Remove a code-point range, clamped to the string length
fn remove_char_range(s: &str, start: usize, len: usize) -> String {
    let mut out: String = s.chars().take(start).collect();
    out.extend(s.chars().skip(start + len));
    out
}

/// Transform a text operation against a concurrent text operation
///
/// Returns the rewritten payload for op1 plus an optional conflict record.
/// Callers guarantee both operations target the same cell and are
/// concurrent.
pub(crate) fn transform_text(
    op1: &Operation,
    op2: &Operation,
    strategy: TextConflictStrategy,
) -> (OperationKind, Option<Conflict>) {
    use OperationKind::*;

    match (&op1.kind, &op2.kind) {
        (TextInsert { .. }, TextInsert { .. }) => (insert_vs_insert(op1, op2), None),
        (TextInsert { .. }, TextDelete { .. }) => (insert_vs_delete(op1, op2), None),
        (TextInsert { .. }, TextReplace { .. }) => (insert_vs_replace(op1, op2), None),
        (TextDelete { .. }, TextInsert { .. }) => (delete_vs_insert(op1, op2), None),
        (TextDelete { .. }, TextDelete { .. }) => (delete_vs_delete(op1, op2), None),
        (TextDelete { .. }, TextReplace { .. }) => (delete_vs_replace(op1, op2), None),
        (TextReplace { .. }, TextInsert { .. }) => (replace_vs_insert(op1, op2), None),
        (TextReplace { .. }, TextDelete { .. }) => (replace_vs_delete(op1, op2), None),
        (TextReplace { .. }, TextReplace { .. }) => replace_vs_replace(op1, op2, strategy),
        _ => (op1.kind.clone(), None),
    }
}

fn insert_vs_insert(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::TextInsert {
        position,
        content,
        length,
    }, OperationKind::TextInsert {
        position: p2,
        length: l2,
        ..
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };

    // Equal positions: the lexicographically smaller user stays left
    let shifts = p2 < position || (p2 == position && op2.user_id < op1.user_id);
    OperationKind::TextInsert {
        position: if shifts { position + l2 } else { *position },
        content: content.clone(),
        length: *length,
    }
}

fn insert_vs_delete(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::TextInsert {
        position,
        content,
        length,
    }, OperationKind::TextDelete {
        position: p2,
        length: l2,
        ..
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };

    let e2 = p2 + l2;
    if *position > *p2 && *position < e2 {
        // Insert landed inside the deleted range: collapse to the range
        // start as a no-op; the mirror transform widens the delete over the
        // inserted text, so both replicas drop it
        return OperationKind::TextInsert {
            position: *p2,
            content: String::new(),
            length: 0,
        };
    }
    let new_position = if *position <= *p2 {
        *position
    } else {
        position - l2
    };
    OperationKind::TextInsert {
        position: new_position,
        content: content.clone(),
        length: *length,
    }
}

fn delete_vs_insert(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::TextDelete {
        position,
        length,
        deleted_content,
    }, OperationKind::TextInsert {
        position: p2,
        length: l2,
        content,
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let (p1, l1) = (*position, *length);

    if *p2 <= p1 {
        return OperationKind::TextDelete {
            position: p1 + l2,
            length: l1,
            deleted_content: deleted_content.clone(),
        };
    }
    if *p2 < p1 + l1 {
        // Insert landed strictly inside the range being deleted: widen the
        // delete over it (the mirror transform collapses the insert)
        let rel = p2 - p1;
        let mut widened: String = deleted_content.chars().take(rel).collect();
        widened.push_str(content);
        widened.extend(deleted_content.chars().skip(rel));
        return OperationKind::TextDelete {
            position: p1,
            length: l1 + l2,
            deleted_content: widened,
        };
    }
    op1.kind.clone()
}

fn delete_vs_delete(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::TextDelete {
        position: p1,
        length: l1,
        deleted_content,
    }, OperationKind::TextDelete {
        position: p2,
        length: l2,
        ..
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let (p1, l1, p2, l2) = (*p1, *l1, *p2, *l2);
    let (e1, e2) = (p1 + l1, p2 + l2);

    if e2 <= p1 {
        // op2 entirely before: shift left
        return OperationKind::TextDelete {
            position: p1 - l2,
            length: l1,
            deleted_content: deleted_content.clone(),
        };
    }
    if p2 >= e1 {
        // op2 entirely after: unchanged
        return op1.kind.clone();
    }

    // Overlap: clamp to the part op2 did not already delete
    let overlap_start = p1.max(p2);
    let overlap_end = e1.min(e2);
    let overlap = overlap_end - overlap_start;
    let new_length = l1 - overlap;
    let new_position = if p2 <= p1 { p2 } else { p1 };
    let new_content = if new_length == 0 {
        String::new()
    } else {
        remove_char_range(deleted_content, overlap_start - p1, overlap)
    };
    OperationKind::TextDelete {
        position: new_position,
        length: new_length,
        deleted_content: new_content,
    }
}

fn replace_vs_insert(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::TextReplace {
        position,
        length,
        new_content,
        old_content,
    }, OperationKind::TextInsert {
        position: p2,
        length: l2,
        content,
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let (p1, l1) = (*position, *length);

    if *p2 <= p1 {
        // Insert before the range: shift right, the insert survives
        return OperationKind::TextReplace {
            position: p1 + l2,
            length: l1,
            new_content: new_content.clone(),
            old_content: old_content.clone(),
        };
    }
    if *p2 < p1 + l1 {
        // Insert landed inside the replaced range: the replacement swallows
        // it (the mirror transform collapses the insert), so both replicas
        // agree the replacement text wins
        let rel = p2 - p1;
        let mut swallowed: String = old_content.chars().take(rel).collect();
        swallowed.push_str(content);
        swallowed.extend(old_content.chars().skip(rel));
        return OperationKind::TextReplace {
            position: p1,
            length: l1 + l2,
            new_content: new_content.clone(),
            old_content: swallowed,
        };
    }
    op1.kind.clone()
}

fn replace_vs_delete(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::TextReplace {
        position: p1,
        length: l1,
        new_content,
        old_content,
    }, OperationKind::TextDelete {
        position: p2,
        length: l2,
        ..
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let (p1, l1, p2, l2) = (*p1, *l1, *p2, *l2);
    let (e1, e2) = (p1 + l1, p2 + l2);

    if p2 <= p1 && e2 >= e1 && l1 > 0 {
        // The delete swallowed the whole replaced range: the replacement
        // has nothing left to stand on
        return OperationKind::TextReplace {
            position: p2,
            length: 0,
            new_content: String::new(),
            old_content: String::new(),
        };
    }

    let (new_position, new_length, new_old) = if e2 <= p1 {
        (p1 - l2, l1, old_content.clone())
    } else if p2 >= e1 {
        (p1, l1, old_content.clone())
    } else {
        let overlap_start = p1.max(p2);
        let overlap_end = e1.min(e2);
        let overlap = overlap_end - overlap_start;
        let position = if p2 <= p1 { p2 } else { p1 };
        (
            position,
            l1 - overlap,
            remove_char_range(old_content, overlap_start - p1, overlap),
        )
    };
    OperationKind::TextReplace {
        position: new_position,
        length: new_length,
        new_content: new_content.clone(),
        old_content: new_old,
    }
}

fn insert_vs_replace(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::TextInsert {
        position,
        content,
        length,
    }, OperationKind::TextReplace {
        position: p2,
        length: l2,
        new_content,
        ..
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let n2 = code_point_len(new_content);
    let (pos, p2, l2) = (*position, *p2, *l2);

    if pos <= p2 {
        return op1.kind.clone();
    }
    if pos >= p2 + l2 {
        // Past the replaced range: account for the length delta
        return OperationKind::TextInsert {
            position: (pos - l2) + n2,
            content: content.clone(),
            length: *length,
        };
    }
    // Strictly inside the replaced range: the replacement overwrote the
    // region being typed into; the mirror transform swallows this text
    OperationKind::TextInsert {
        position: p2,
        content: String::new(),
        length: 0,
    }
}

fn delete_vs_replace(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::TextDelete {
        position: p1,
        length: l1,
        deleted_content,
    }, OperationKind::TextReplace {
        position: p2,
        length: l2,
        new_content,
        old_content,
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let n2 = code_point_len(new_content);
    let (p1, l1, p2, l2) = (*p1, *l1, *p2, *l2);

    if p1 <= p2 && p1 + l1 >= p2 + l2 && l2 > 0 {
        // The delete covered the whole replaced range: extend it over the
        // replacement text so both replicas end with the range gone
        let rel = p2 - p1;
        let mut extended: String = deleted_content.chars().take(rel).collect();
        extended.push_str(new_content);
        extended.extend(deleted_content.chars().skip(rel + l2));
        return OperationKind::TextDelete {
            position: p1,
            length: (l1 - l2) + n2,
            deleted_content: extended,
        };
    }

    // Clamp against the replaced range as if it were a delete, then shift
    // right past the inserted replacement when the range sits at or after it.
    let as_delete = Operation {
        kind: OperationKind::TextDelete {
            position: p2,
            length: l2,
            deleted_content: old_content.clone(),
        },
        ..op2.clone()
    };
    let clamped = delete_vs_delete(op1, &as_delete);
    match clamped {
        OperationKind::TextDelete {
            position,
            length,
            deleted_content,
        } => {
            let position = if position >= p2 && length > 0 {
                position + n2
            } else {
                position
            };
            OperationKind::TextDelete {
                position,
                length,
                deleted_content,
            }
        }
        other => other,
    }
}

/// Rewrite a winning replace so it overrides the loser's applied effect
///
/// The transformed operation applies after op2, so op2's replacement text is
/// already in the field. The winner must therefore replace the whole
/// combined region, stitched from both old contents, with the text the
/// winner alone would have produced. Both replicas then converge on the
/// winner's value whichever operation applied first.
fn reconstruct_overlapping_winner(op1: &Operation, op2: &Operation) -> OperationKind {
    let (OperationKind::TextReplace {
        position: p1,
        length: l1,
        new_content: new1,
        old_content: old1,
    }, OperationKind::TextReplace {
        position: p2,
        length: l2,
        new_content: new2,
        old_content: old2,
    }) = (&op1.kind, &op2.kind)
    else {
        return op1.kind.clone();
    };
    let (p1, l1, p2, l2) = (*p1, *l1, *p2, *l2);
    let u0 = p1.min(p2);
    let u1 = (p1 + l1).max(p2 + l2);

    // Overlapping intervals leave no gap, so every slot gets filled
    let mut original: Vec<char> = vec![' '; u1 - u0];
    for (i, ch) in old1.chars().enumerate() {
        original[p1 - u0 + i] = ch;
    }
    for (i, ch) in old2.chars().enumerate() {
        original[p2 - u0 + i] = ch;
    }

    // What the winner alone would have made of the region
    let mut desired: String = original[..p1 - u0].iter().collect();
    desired.push_str(new1);
    desired.extend(original[p1 - u0 + l1..].iter());

    // What the region looks like now that the loser has applied
    let mut current: String = original[..p2 - u0].iter().collect();
    current.push_str(new2);
    current.extend(original[p2 - u0 + l2..].iter());

    OperationKind::TextReplace {
        position: u0,
        length: code_point_len(&current),
        new_content: desired,
        old_content: current,
    }
}

fn replace_vs_replace(
    op1: &Operation,
    op2: &Operation,
    strategy: TextConflictStrategy,
) -> (OperationKind, Option<Conflict>) {
    let (OperationKind::TextReplace {
        position: p1,
        length: l1,
        new_content: new1,
        old_content: old1,
    }, OperationKind::TextReplace {
        position: p2,
        length: l2,
        new_content: new2,
        ..
    }) = (&op1.kind, &op2.kind)
    else {
        return (op1.kind.clone(), None);
    };
    let (p1, l1, p2, l2) = (*p1, *l1, *p2, *l2);

    if !spans_overlap((p1, l1), (p2, l2)) {
        // Disjoint: only an earlier op2 shifts op1
        let shift = code_point_len(new2) as i64 - l2 as i64;
        let new_position = if p2 + l2 <= p1 {
            (p1 as i64 + shift) as usize
        } else {
            p1
        };
        return (
            OperationKind::TextReplace {
                position: new_position,
                length: l1,
                new_content: new1.clone(),
                old_content: old1.clone(),
            },
            None,
        );
    }

    // Overlapping replacements: a true conflict, resolved per config
    let noop = OperationKind::TextReplace {
        position: p1,
        length: 0,
        new_content: String::new(),
        old_content: String::new(),
    };
    match strategy {
        TextConflictStrategy::PreferLatest => {
            if op2.is_later_than(op1) {
                let conflict = Conflict::new(
                    ConflictKind::TextOverlap,
                    ConflictResolution::RemoteWins,
                    op1,
                    op2,
                    format!("overlapping replacement on {}.{}", op1.target, op1.field),
                );
                (noop, Some(conflict))
            } else {
                let conflict = Conflict::new(
                    ConflictKind::TextOverlap,
                    ConflictResolution::LocalWins,
                    op1,
                    op2,
                    format!("overlapping replacement on {}.{}", op1.target, op1.field),
                );
                (reconstruct_overlapping_winner(op1, op2), Some(conflict))
            }
        }
        TextConflictStrategy::PreferLongest => {
            let len1 = code_point_len(new1);
            let len2 = code_point_len(new2);
            let local_wins = len1 > len2 || (len1 == len2 && !op2.is_later_than(op1));
            let (kind, resolution) = if local_wins {
                (
                    reconstruct_overlapping_winner(op1, op2),
                    ConflictResolution::LocalWins,
                )
            } else {
                (noop, ConflictResolution::RemoteWins)
            };
            let conflict = Conflict::new(
                ConflictKind::TextOverlap,
                resolution,
                op1,
                op2,
                format!("overlapping replacement on {}.{}", op1.target, op1.field),
            );
            (kind, Some(conflict))
        }
        TextConflictStrategy::Merge => {
            let merged = OperationKind::TextReplace {
                position: p1,
                length: l1.max(l2),
                new_content: format!("{new1} | {new2}"),
                old_content: old1.clone(),
            };
            let conflict = Conflict::new(
                ConflictKind::TextOverlap,
                ConflictResolution::Merged,
                op1,
                op2,
                format!("merged replacements on {}.{}", op1.target, op1.field),
            );
            (merged, Some(conflict))
        }
        TextConflictStrategy::Manual => {
            let conflict = Conflict::new(
                ConflictKind::TextOverlap,
                ConflictResolution::Manual,
                op1,
                op2,
                format!(
                    "overlapping replacement on {}.{}: \"{new1}\" vs \"{new2}\"",
                    op1.target, op1.field
                ),
            );
            (op1.kind.clone(), Some(conflict))
        }
    }
}
