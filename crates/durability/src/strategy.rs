//! Save strategies: per-cell versus legacy whole-document
//!
//! New documents persist through the per-cell coordinator. Legacy documents
//! write the full row list under an optimistic `doc_version`
//! compare-and-swap; on a conflict the saver refetches, re-applies the local
//! pending operations on top of the server state, and retries. The host
//! picks one strategy per document at load time.

use crate::saver::SaveCoordinator;
use crate::store::{DocumentStore, StructuralOperation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cueline_core::{CuelineError, Document, DocumentId, FieldValue, Operation, Result, RowId};
use cueline_engine::apply_operation;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Provider of the operations still awaiting durability, used by the legacy
/// conflict-recovery path
pub type PendingOperationsSource = Arc<dyn Fn() -> Vec<Operation> + Send + Sync>;

/// The write path a document uses
///
/// Dispatch is chosen once at document load instead of checked per save.
#[async_trait]
pub trait SaveStrategy: Send + Sync {
    /// Queue a single-field write
    fn enqueue_cell(&self, row_id: RowId, field: &str, value: FieldValue);

    /// Queue a structural change
    fn enqueue_structural(&self, operation: StructuralOperation);

    /// Wait until everything queued has been persisted
    async fn flush(&self);

    /// Writes queued or in flight
    fn pending_save_count(&self) -> usize;

    /// Wall time of the most recent successful write
    fn last_saved_at(&self) -> Option<DateTime<Utc>>;
}

#[async_trait]
impl SaveStrategy for SaveCoordinator {
    fn enqueue_cell(&self, row_id: RowId, field: &str, value: FieldValue) {
        self.enqueue_cell_save(row_id, field, value);
    }

    fn enqueue_structural(&self, operation: StructuralOperation) {
        self.enqueue_structural_save(operation);
    }

    async fn flush(&self) {
        self.flush_pending_saves().await;
    }

    fn pending_save_count(&self) -> usize {
        self.pending_save_count()
    }

    fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at()
    }
}

struct LegacyInner {
    document_id: DocumentId,
    store: Arc<dyn DocumentStore>,
    snapshot_source: crate::saver::SnapshotSource,
    pending_source: PendingOperationsSource,
    doc_version: Mutex<u64>,
    dirty: AtomicBool,
    flushing: AtomicBool,
    debounce_ms: u64,
    max_retries: u32,
    last_saved_at: Mutex<Option<DateTime<Utc>>>,
}

/// Legacy whole-document saver with optimistic concurrency
///
/// Every change marks the document dirty; a debounced flush writes the full
/// state under compare-and-swap.
#[derive(Clone)]
pub struct WholeDocumentSaver {
    inner: Arc<LegacyInner>,
}

impl WholeDocumentSaver {
    /// Create a legacy saver for one document
    pub fn new(
        document_id: DocumentId,
        initial_version: u64,
        store: Arc<dyn DocumentStore>,
        snapshot_source: crate::saver::SnapshotSource,
        pending_source: PendingOperationsSource,
        debounce_ms: u64,
    ) -> Self {
        Self {
            inner: Arc::new(LegacyInner {
                document_id,
                store,
                snapshot_source,
                pending_source,
                doc_version: Mutex::new(initial_version),
                dirty: AtomicBool::new(false),
                flushing: AtomicBool::new(false),
                debounce_ms,
                max_retries: 3,
                last_saved_at: Mutex::new(None),
            }),
        }
    }

    fn mark_dirty(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);
        if self.inner.flushing.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(this.inner.debounce_ms)).await;
            let _ = this.flush_now().await;
            this.inner.flushing.store(false, Ordering::SeqCst);
            // A change may have landed mid-flush
            if this.inner.dirty.load(Ordering::SeqCst) {
                this.mark_dirty();
            }
        });
    }

    /// Write the current document state under compare-and-swap
    ///
    /// On a version conflict: refetch the server state, re-apply local
    /// pending operations on top of it, and retry with the fresh version.
    pub async fn flush_now(&self) -> Result<()> {
        if !self.inner.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut document = (self.inner.snapshot_source)();
        let mut version = *self.inner.doc_version.lock();

        for attempt in 1..=self.inner.max_retries {
            match self.inner.store.save_document(&document, version).await {
                Ok(new_version) => {
                    *self.inner.doc_version.lock() = new_version;
                    *self.inner.last_saved_at.lock() = Some(Utc::now());
                    debug!(
                        target: "cueline::save",
                        document = %self.inner.document_id,
                        version = new_version,
                        "legacy whole-document save committed"
                    );
                    return Ok(());
                }
                Err(e) if attempt < self.inner.max_retries => {
                    warn!(
                        target: "cueline::save",
                        document = %self.inner.document_id,
                        attempt,
                        error = %e,
                        "legacy save conflicted; refetching"
                    );
                    let server = self
                        .inner
                        .store
                        .fetch_document(self.inner.document_id)
                        .await?;
                    version = server.doc_version;
                    let mut merged = server;
                    for op in (self.inner.pending_source)() {
                        // Re-apply local changes on top of the server state;
                        // ops that no longer fit are skipped, not fatal
                        let _ = apply_operation(&mut merged, &op);
                    }
                    document = merged;
                }
                Err(e) => {
                    self.inner.dirty.store(true, Ordering::SeqCst);
                    return Err(CuelineError::save_failed(
                        format!("document:{}", self.inner.document_id),
                        self.inner.max_retries,
                        e.to_string(),
                    ));
                }
            }
        }
        unreachable!("retry loop returns on success or final error")
    }
}

#[async_trait]
impl SaveStrategy for WholeDocumentSaver {
    fn enqueue_cell(&self, _row_id: RowId, _field: &str, _value: FieldValue) {
        self.mark_dirty();
    }

    fn enqueue_structural(&self, _operation: StructuralOperation) {
        self.mark_dirty();
    }

    async fn flush(&self) {
        let _ = self.flush_now().await;
        while self.inner.flushing.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn pending_save_count(&self) -> usize {
        usize::from(self.inner.dirty.load(Ordering::SeqCst))
    }

    fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_saved_at.lock()
    }
}
