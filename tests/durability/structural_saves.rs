//! Structural saves: snapshots, serialization, and offline recovery

use crate::common::{sample_document, text, MemoryStore, StoreWrite};
use cueline::{
    content_signature, Row, SaveCoordinator, SaveCoordinatorConfig, StructuralOperation,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Coordinator whose snapshot source reads a shared, mutable document
fn live_coordinator(
    store: Arc<MemoryStore>,
) -> (SaveCoordinator, Arc<Mutex<cueline::Document>>) {
    let document = Arc::new(Mutex::new(sample_document(3)));
    let source = document.clone();
    let id = document.lock().id;
    let saver = SaveCoordinator::new(
        id,
        store,
        Arc::new(move || source.lock().clone()),
        SaveCoordinatorConfig {
            debounce_ms: 5,
            max_retries: 3,
            retry_base_ms: 5,
        },
    );
    (saver, document)
}

#[tokio::test]
async fn snapshot_equals_document_fold_at_enqueue_time() {
    let store = MemoryStore::new();
    let (saver, document) = live_coordinator(store.clone());

    let signature_at_enqueue = content_signature(&document.lock().clone());
    let order: Vec<_> = document.lock().rows.iter().map(|r| r.id).collect();
    saver.enqueue_structural_save(StructuralOperation::Reorder { order });

    // The document keeps changing after the enqueue; the snapshot must not
    document.lock().rows.push(Row::regular());

    saver.flush_pending_saves().await;
    let writes = store.structural_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].snapshot.signature, signature_at_enqueue);
    assert_eq!(writes[0].snapshot.rows_ordered.len(), 3);
}

#[tokio::test]
async fn structural_saves_never_land_without_snapshots() {
    let store = MemoryStore::new();
    let (saver, document) = live_coordinator(store.clone());
    let victim = document.lock().rows[0].id;

    saver.enqueue_structural_save(StructuralOperation::DeleteRow { row_id: victim });
    saver.enqueue_structural_save(StructuralOperation::AddRow {
        position: 0,
        row: Row::regular(),
    });
    saver.flush_pending_saves().await;

    for write in store.structural_writes() {
        assert_eq!(write.snapshot.signature.len(), 64);
        assert!(!write.snapshot.rows_ordered.is_empty());
    }
}

#[tokio::test]
async fn offline_structural_save_retries_after_wake() {
    // A pending reorder survives a two-minute network outage: on wake the
    // write retries with its original snapshot, and cell saves submitted
    // before it stay ordered ahead of it
    let store = MemoryStore::new();
    let (saver, document) = live_coordinator(store.clone());
    let row = document.lock().rows[0].id;

    // Cell save submitted before the structural one
    saver.enqueue_cell_save(row, "name", text("before reorder"));
    saver.flush_pending_saves().await;

    store.set_offline(true);
    saver.pause();
    let order: Vec<_> = document.lock().rows.iter().map(|r| r.id).collect();
    let expected_signature = content_signature(&document.lock().clone());
    saver.enqueue_structural_save(StructuralOperation::Reorder { order });
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(store.structural_writes().is_empty());
    assert_eq!(saver.pending_save_count(), 1);

    // Wake: transport back, saves resume
    store.set_offline(false);
    saver.resume();
    saver.flush_pending_saves().await;

    let writes = store.writes.lock().clone();
    assert_eq!(writes.len(), 2);
    assert!(matches!(writes[0], StoreWrite::Cell(_)));
    match &writes[1] {
        StoreWrite::Structural(request) => {
            assert_eq!(request.snapshot.signature, expected_signature);
        }
        _ => panic!("expected the structural write after the cell write"),
    }
}

#[tokio::test]
async fn cell_saves_for_deleted_row_wait_for_structural_write() {
    let store = MemoryStore::new();
    let (saver, document) = live_coordinator(store.clone());
    let victim = document.lock().rows[0].id;
    let survivor = document.lock().rows[1].id;

    saver.enqueue_structural_save(StructuralOperation::DeleteRow { row_id: victim });
    saver.enqueue_cell_save(victim, "name", text("late edit"));
    saver.enqueue_cell_save(survivor, "name", text("unrelated"));
    saver.flush_pending_saves().await;

    // Everything lands; the affected cell write was gated, not lost
    assert_eq!(store.structural_writes().len(), 1);
    assert_eq!(store.cell_writes().len(), 2);
}
