//! Per-cell save ordering and loss bounds

use crate::common::{sample_document, text, MemoryStore};
use cueline::{SaveCoordinator, SaveCoordinatorConfig, SaveEvent};
use std::sync::Arc;
use std::time::Duration;

fn coordinator(store: Arc<MemoryStore>) -> (SaveCoordinator, cueline::Document) {
    let document = sample_document(2);
    let snapshot = document.clone();
    let saver = SaveCoordinator::new(
        document.id,
        store,
        Arc::new(move || snapshot.clone()),
        SaveCoordinatorConfig {
            debounce_ms: 10,
            max_retries: 3,
            retry_base_ms: 5,
        },
    );
    (saver, document)
}

#[tokio::test]
async fn committed_values_are_a_suffix_respecting_subsequence() {
    // Submitted per-field values must reach the store in submission order,
    // never an older value after a newer one, always ending with the final
    // value
    let store = MemoryStore::new();
    let (saver, document) = coordinator(store.clone());
    let row = document.rows[0].id;

    for value in ["d", "dr", "dra", "draf", "draft"] {
        saver.enqueue_cell_save(row, "script", text(value));
        tokio::time::sleep(Duration::from_millis(4)).await;
    }
    saver.flush_pending_saves().await;

    let submitted = ["d", "dr", "dra", "draf", "draft"];
    let committed: Vec<String> = store
        .cell_writes()
        .iter()
        .map(|w| match &w.value {
            cueline::FieldValue::Text(s) => s.clone(),
            _ => panic!("expected text"),
        })
        .collect();

    assert!(!committed.is_empty());
    assert_eq!(committed.last().unwrap(), "draft");
    // Order-preserving subsequence check
    let mut cursor = 0;
    for value in &committed {
        let found = submitted[cursor..]
            .iter()
            .position(|s| s == value)
            .expect("committed value must appear in submission order");
        cursor += found + 1;
    }
}

#[tokio::test]
async fn transport_drop_holds_latest_value_and_flushes_once() {
    // Edits "A" → "AB" → "ABC" with the transport dropping mid-stream: the
    // final value must not be discarded, and exactly one write carries it
    // after reconnection
    let store = MemoryStore::new();
    let (saver, document) = coordinator(store.clone());
    let row = document.rows[0].id;

    saver.enqueue_cell_save(row, "name", text("A"));
    saver.flush_pending_saves().await;
    assert_eq!(store.cell_writes().len(), 1);

    store.set_offline(true);
    saver.pause();
    saver.enqueue_cell_save(row, "name", text("AB"));
    saver.enqueue_cell_save(row, "name", text("ABC"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.cell_writes().len(), 1, "no write while offline");
    assert!(saver.pending_save_count() > 0);

    store.set_offline(false);
    saver.resume();
    saver.flush_pending_saves().await;

    let writes = store.cell_writes();
    assert_eq!(writes.len(), 2, "exactly one follow-up write");
    assert_eq!(writes[1].value, text("ABC"));
    assert!(saver.last_saved_at().is_some());
}

#[tokio::test]
async fn writes_to_different_fields_are_independent() {
    let store = MemoryStore::new();
    let (saver, document) = coordinator(store.clone());
    let row = document.rows[0].id;
    let other = document.rows[1].id;

    saver.enqueue_cell_save(row, "name", text("open"));
    saver.enqueue_cell_save(row, "script", text("good evening"));
    saver.enqueue_cell_save(other, "name", text("vt"));
    saver.flush_pending_saves().await;

    let writes = store.cell_writes();
    assert_eq!(writes.len(), 3);
    assert!(writes.iter().any(|w| w.row_id == other && w.field == "name"));
}

#[tokio::test]
async fn failure_events_reach_the_bus() {
    let store = MemoryStore::new();
    store.set_offline(true);
    let (saver, document) = coordinator(store.clone());
    let row = document.rows[0].id;

    let mut events = saver.subscribe_events();
    saver.enqueue_cell_save(row, "name", text("unsaved"));
    tokio::time::sleep(Duration::from_millis(80)).await;

    let mut saw_failed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SaveEvent::Failed { .. }) {
            saw_failed = true;
        }
    }
    assert!(saw_failed, "persistent failure surfaces on the bus");
    assert!(saver.last_saved_at().is_none());
    // The value is still queued, not discarded
    assert_eq!(saver.pending_save_count(), 1);
}
