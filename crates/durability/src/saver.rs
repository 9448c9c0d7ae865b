//! The per-cell save coordinator
//!
//! Translates applied operations into durable writes. Cell saves debounce
//! per (row, field), coalesce to the latest value, and keep at most one
//! write in flight per field with exactly one follow-up when a newer value
//! arrives mid-write. Structural saves are fully serialized and carry a
//! content snapshot taken at enqueue time. Failed writes retry with bounded
//! backoff; the value is never discarded until it lands or the host
//! explicitly abandons it.

use crate::store::{
    CellSaveRequest, ContentSnapshot, DocumentStore, StructuralOperation, StructuralSaveRequest,
};
use chrono::{DateTime, Utc};
use cueline_core::{
    content_signature, CuelineError, Document, DocumentId, FieldValue, Result, RowId,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Provider of the current document projection (the fold of the operation
/// log), used to take structural snapshots at enqueue time
pub type SnapshotSource = Arc<dyn Fn() -> Document + Send + Sync>;

/// Timing and retry knobs for the coordinator
#[derive(Debug, Clone)]
pub struct SaveCoordinatorConfig {
    /// Per-field debounce before a cell write flushes
    pub debounce_ms: u64,
    /// Write attempts before a save is reported failed
    pub max_retries: u32,
    /// Base delay of the retry backoff (doubles per attempt)
    pub retry_base_ms: u64,
}

impl Default for SaveCoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_retries: 3,
            retry_base_ms: 500,
        }
    }
}

/// Events published on the coordinator's bus
#[derive(Debug, Clone)]
pub enum SaveEvent {
    /// A cell write landed
    CellSaved {
        /// Row written
        row_id: RowId,
        /// Field written
        field: String,
    },
    /// A structural write landed
    StructuralSaved {
        /// Wire name of the structural kind
        kind: &'static str,
    },
    /// A write failed and is about to retry
    Retrying {
        /// Which write ("row.field" or "structural:kind")
        context: String,
        /// The attempt that just failed
        attempt: u32,
    },
    /// A write exhausted its retries; the value is kept for later
    Failed {
        /// Which write failed
        context: String,
        /// Failure description
        message: String,
    },
    /// The queues drained to empty
    Flushed,
}

#[derive(Debug, Clone)]
struct PendingCell {
    value: FieldValue,
    client_ts: i64,
}

#[derive(Debug, Default)]
struct CellSlot {
    pending: Option<PendingCell>,
    in_flight: bool,
    scheduled: bool,
}

#[derive(Debug, Clone)]
struct StructuralItem {
    operation: StructuralOperation,
    snapshot: ContentSnapshot,
}

type CellKey = (RowId, String);

struct CoordinatorInner {
    document_id: DocumentId,
    store: Arc<dyn DocumentStore>,
    snapshot_source: SnapshotSource,
    config: SaveCoordinatorConfig,
    cells: Mutex<HashMap<CellKey, CellSlot>>,
    structural_queue: Mutex<VecDeque<StructuralItem>>,
    structural_draining: AtomicBool,
    structural_write_lock: tokio::sync::Mutex<()>,
    active_structural: Mutex<Option<StructuralOperation>>,
    paused: AtomicBool,
    last_saved_at: Mutex<Option<DateTime<Utc>>>,
    events: broadcast::Sender<SaveEvent>,
}

/// The per-document save coordinator
///
/// Cheap to clone; all clones share one set of queues.
#[derive(Clone)]
pub struct SaveCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl SaveCoordinator {
    /// Create a coordinator for one document
    pub fn new(
        document_id: DocumentId,
        store: Arc<dyn DocumentStore>,
        snapshot_source: SnapshotSource,
        config: SaveCoordinatorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(CoordinatorInner {
                document_id,
                store,
                snapshot_source,
                config,
                cells: Mutex::new(HashMap::new()),
                structural_queue: Mutex::new(VecDeque::new()),
                structural_draining: AtomicBool::new(false),
                structural_write_lock: tokio::sync::Mutex::new(()),
                active_structural: Mutex::new(None),
                paused: AtomicBool::new(false),
                last_saved_at: Mutex::new(None),
                events,
            }),
        }
    }

    /// Subscribe to save events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SaveEvent> {
        self.inner.events.subscribe()
    }

    /// Queue a field write, coalescing into the latest value
    ///
    /// Fire-and-forget from the caller's perspective; failures surface on
    /// the event bus.
    pub fn enqueue_cell_save(&self, row_id: RowId, field: impl Into<String>, value: FieldValue) {
        let field = field.into();
        let key: CellKey = (row_id, field);
        let schedule = {
            let mut cells = self.inner.cells.lock();
            let slot = cells.entry(key.clone()).or_default();
            // Later values supersede earlier unsent ones for the same field
            slot.pending = Some(PendingCell {
                value,
                client_ts: Utc::now().timestamp_millis(),
            });
            if slot.scheduled || slot.in_flight {
                false
            } else {
                slot.scheduled = true;
                true
            }
        };
        if schedule {
            let this = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(this.inner.config.debounce_ms)).await;
                this.flush_cell(key).await;
            });
        }
    }

    /// Queue a structural change, snapshotting the document now
    ///
    /// The snapshot is the canonical fold of the operation log at enqueue
    /// time; the structural writer never recomputes it.
    pub fn enqueue_structural_save(&self, operation: StructuralOperation) {
        let document = (self.inner.snapshot_source)();
        let snapshot = ContentSnapshot {
            rows_ordered: document.rows.clone(),
            signature: content_signature(&document),
        };
        self.inner
            .structural_queue
            .lock()
            .push_back(StructuralItem {
                operation,
                snapshot,
            });
        self.spawn_structural_drain();
    }

    /// Pause all writes (auth invalid or transport down). Queued state is
    /// held, not discarded.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        debug!(target: "cueline::save", document = %self.inner.document_id, "saves paused");
    }

    /// Resume writes and re-kick every held queue
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        debug!(target: "cueline::save", document = %self.inner.document_id, "saves resumed");
        self.kick_pending_cells();
        self.spawn_structural_drain();
    }

    /// Wall time of the most recent successful write
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_saved_at.lock()
    }

    /// Writes queued or in flight, cell and structural combined
    pub fn pending_save_count(&self) -> usize {
        let cells = self
            .inner
            .cells
            .lock()
            .values()
            .filter(|slot| slot.pending.is_some() || slot.in_flight)
            .count();
        let structural = self.inner.structural_queue.lock().len();
        let active = usize::from(self.inner.active_structural.lock().is_some());
        cells + structural + active
    }

    /// Wait until every queue is empty
    ///
    /// Re-kicks held writes first so a previously failed value gets another
    /// attempt instead of waiting forever.
    pub async fn flush_pending_saves(&self) {
        self.kick_pending_cells();
        self.spawn_structural_drain();
        loop {
            if self.pending_save_count() == 0 {
                let _ = self.inner.events.send(SaveEvent::Flushed);
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Schedule an immediate flush for any unscheduled pending cell
    fn kick_pending_cells(&self) {
        let keys: Vec<CellKey> = {
            let mut cells = self.inner.cells.lock();
            cells
                .iter_mut()
                .filter(|(_, slot)| slot.pending.is_some() && !slot.scheduled && !slot.in_flight)
                .map(|(key, slot)| {
                    slot.scheduled = true;
                    key.clone()
                })
                .collect()
        };
        for key in keys {
            let this = self.clone();
            tokio::spawn(async move {
                this.flush_cell(key).await;
            });
        }
    }

    /// True while this cell write must hold off
    fn cell_blocked(&self, key: &CellKey) -> bool {
        if self.inner.paused.load(Ordering::SeqCst) {
            return true;
        }
        self.inner
            .active_structural
            .lock()
            .as_ref()
            .map_or(false, |op| op.affects_cell(key.0, &key.1))
    }

    async fn flush_cell(&self, key: CellKey) {
        loop {
            while self.cell_blocked(&key) {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }

            let item = {
                let mut cells = self.inner.cells.lock();
                let Some(slot) = cells.get_mut(&key) else { return };
                match slot.pending.take() {
                    Some(item) => {
                        slot.scheduled = false;
                        slot.in_flight = true;
                        item
                    }
                    None => {
                        slot.scheduled = false;
                        return;
                    }
                }
            };

            let context = format!("{}.{}", key.0, key.1);
            let request = CellSaveRequest {
                document_id: self.inner.document_id,
                row_id: key.0,
                field: key.1.clone(),
                value: item.value.clone(),
                client_ts: item.client_ts,
            };
            let result = self.write_cell_with_retry(&context, request).await;

            {
                let mut cells = self.inner.cells.lock();
                if let Some(slot) = cells.get_mut(&key) {
                    slot.in_flight = false;
                    if result.is_err() && slot.pending.is_none() {
                        // Keep the unsaved value for a later pass
                        slot.pending = Some(item);
                    }
                }
            }

            match result {
                Ok(()) => {
                    *self.inner.last_saved_at.lock() = Some(Utc::now());
                    let _ = self.inner.events.send(SaveEvent::CellSaved {
                        row_id: key.0,
                        field: key.1.clone(),
                    });
                    // Loop again: a newer value may have arrived mid-write
                }
                Err(e) => {
                    let _ = self.inner.events.send(SaveEvent::Failed {
                        context,
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    async fn write_cell_with_retry(&self, context: &str, request: CellSaveRequest) -> Result<()> {
        let max = self.inner.config.max_retries.max(1);
        let mut last = None;
        for attempt in 1..=max {
            match self.inner.store.save_cell(request.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        target: "cueline::save",
                        context,
                        attempt,
                        error = %e,
                        "cell save attempt failed"
                    );
                    last = Some(e);
                    if attempt < max {
                        let _ = self.inner.events.send(SaveEvent::Retrying {
                            context: context.to_string(),
                            attempt,
                        });
                        let backoff =
                            self.inner.config.retry_base_ms * (1 << (attempt - 1)) as u64;
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }
        Err(CuelineError::save_failed(
            context,
            max,
            last.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    fn spawn_structural_drain(&self) {
        if self.inner.structural_queue.lock().is_empty() {
            return;
        }
        if self.inner.structural_draining.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            this.drain_structural().await;
        });
    }

    async fn drain_structural(&self) {
        loop {
            if self.inner.paused.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(25)).await;
                continue;
            }

            let Some(item) = self.inner.structural_queue.lock().pop_front() else {
                self.inner.structural_draining.store(false, Ordering::SeqCst);
                // Re-check: an enqueue may have raced the flag
                if self.inner.structural_queue.lock().is_empty()
                    || self.inner.structural_draining.swap(true, Ordering::SeqCst)
                {
                    return;
                }
                continue;
            };

            if !self.write_structural_item(item).await {
                // Persistent failure: the item went back to the queue front
                self.inner.structural_draining.store(false, Ordering::SeqCst);
                return;
            }
        }
    }

    /// Perform one structural write. Returns false on persistent failure
    /// (the item is pushed back so nothing is lost).
    async fn write_structural_item(&self, item: StructuralItem) -> bool {
        let _guard = self.inner.structural_write_lock.lock().await;
        *self.inner.active_structural.lock() = Some(item.operation.clone());

        // Let in-flight writes for affected fields land before the
        // structural write commits
        loop {
            let colliding = self.inner.cells.lock().iter().any(|(key, slot)| {
                slot.in_flight && item.operation.affects_cell(key.0, &key.1)
            });
            if !colliding {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let kind = item.operation.kind_name();
        let context = format!("structural:{kind}");
        let request = StructuralSaveRequest {
            document_id: self.inner.document_id,
            operation: item.operation.clone(),
            snapshot: item.snapshot.clone(),
        };

        let max = self.inner.config.max_retries.max(1);
        let mut success = false;
        for attempt in 1..=max {
            match self.inner.store.save_structural(request.clone()).await {
                Ok(()) => {
                    success = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        target: "cueline::save",
                        context = %context,
                        attempt,
                        error = %e,
                        "structural save attempt failed"
                    );
                    if attempt < max {
                        let _ = self.inner.events.send(SaveEvent::Retrying {
                            context: context.clone(),
                            attempt,
                        });
                        let backoff =
                            self.inner.config.retry_base_ms * (1 << (attempt - 1)) as u64;
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    } else {
                        let _ = self.inner.events.send(SaveEvent::Failed {
                            context: context.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        *self.inner.active_structural.lock() = None;

        if success {
            *self.inner.last_saved_at.lock() = Some(Utc::now());
            let _ = self.inner.events.send(SaveEvent::StructuralSaved { kind });
        } else {
            self.inner.structural_queue.lock().push_front(item);
        }
        success
    }
}
