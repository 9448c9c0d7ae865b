//! Shared fixtures for the integration suites

#![allow(dead_code)]

use async_trait::async_trait;
use cueline::{
    AuthSession, CellSaveRequest, CuelineError, Document, DocumentId, DocumentStore, FieldValue,
    OpTarget, Operation, OperationKind, Result, RevisionId, Row, RowId, SessionProvider,
    StructuralSaveRequest, Transport, UserId, VectorClock,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A document with `n` regular rows named "row 0".."row n-1"
pub fn sample_document(n: usize) -> Document {
    let mut document = Document::new(DocumentId::new());
    document.title = "Test Rundown".to_string();
    for i in 0..n {
        document
            .rows
            .push(Row::regular().with_field("name", format!("row {i}").into()));
    }
    document
}

/// A concurrent text insert (empty clock, so it is concurrent with any
/// other freshly built op)
pub fn insert_op(
    user: &str,
    target: OpTarget,
    field: &str,
    position: usize,
    content: &str,
    timestamp: i64,
) -> Operation {
    Operation::create(
        UserId::from(user),
        1,
        VectorClock::new(),
        target,
        field,
        timestamp,
        OperationKind::TextInsert {
            position,
            content: content.to_string(),
            length: content.chars().count(),
        },
    )
}

/// A concurrent text delete
pub fn delete_op(
    user: &str,
    target: OpTarget,
    field: &str,
    position: usize,
    deleted: &str,
    timestamp: i64,
) -> Operation {
    Operation::create(
        UserId::from(user),
        1,
        VectorClock::new(),
        target,
        field,
        timestamp,
        OperationKind::TextDelete {
            position,
            length: deleted.chars().count(),
            deleted_content: deleted.to_string(),
        },
    )
}

/// A concurrent text replace
pub fn replace_op(
    user: &str,
    target: OpTarget,
    field: &str,
    position: usize,
    old: &str,
    new: &str,
    timestamp: i64,
) -> Operation {
    Operation::create(
        UserId::from(user),
        1,
        VectorClock::new(),
        target,
        field,
        timestamp,
        OperationKind::TextReplace {
            position,
            length: old.chars().count(),
            new_content: new.to_string(),
            old_content: old.to_string(),
        },
    )
}

/// One write observed by the in-memory store, in arrival order
#[derive(Debug, Clone)]
pub enum StoreWrite {
    Cell(CellSaveRequest),
    Structural(StructuralSaveRequest),
}

/// In-memory backing store with an ordered write log and failure injection
#[derive(Default)]
pub struct MemoryStore {
    pub writes: Mutex<Vec<StoreWrite>>,
    pub offline: AtomicBool,
    pub document: Mutex<Option<Document>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn cell_writes(&self) -> Vec<CellSaveRequest> {
        self.writes
            .lock()
            .iter()
            .filter_map(|w| match w {
                StoreWrite::Cell(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn structural_writes(&self) -> Vec<StructuralSaveRequest> {
        self.writes
            .lock()
            .iter()
            .filter_map(|w| match w {
                StoreWrite::Structural(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn save_cell(&self, request: CellSaveRequest) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CuelineError::transport("store offline"));
        }
        self.writes.lock().push(StoreWrite::Cell(request));
        Ok(())
    }

    async fn save_structural(&self, request: StructuralSaveRequest) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CuelineError::transport("store offline"));
        }
        self.writes.lock().push(StoreWrite::Structural(request));
        Ok(())
    }

    async fn save_document(&self, document: &Document, expected_version: u64) -> Result<u64> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CuelineError::transport("store offline"));
        }
        let mut stored = self.document.lock();
        let current = stored.as_ref().map_or(0, |d| d.doc_version);
        if current != expected_version {
            return Err(CuelineError::save_failed(
                "document",
                1,
                format!("version conflict: expected {expected_version}, at {current}"),
            ));
        }
        let mut next = document.clone();
        next.doc_version = current + 1;
        *stored = Some(next);
        Ok(current + 1)
    }

    async fn fetch_document(&self, id: DocumentId) -> Result<Document> {
        Ok(self
            .document
            .lock()
            .clone()
            .unwrap_or_else(|| Document::new(id)))
    }

    async fn restore_from_revision(&self, _: DocumentId, _: RevisionId) -> Result<()> {
        Ok(())
    }
}

/// Transport fake: probe/reconnect with controllable liveness
pub struct TestTransport {
    pub alive: AtomicBool,
    pub reconnects: AtomicUsize,
}

impl TestTransport {
    pub fn new(alive: bool) -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(alive),
            reconnects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Transport for TestTransport {
    async fn probe(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<()> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        self.alive.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Channel fake counting resubscriptions
pub struct TestChannel {
    pub resubscribes: AtomicUsize,
}

impl TestChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            resubscribes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl cueline::ChannelSubscriber for TestChannel {
    async fn resubscribe(&self) -> Result<()> {
        self.resubscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Session provider that always returns a valid one-hour session
pub struct ValidSessionProvider;

#[async_trait]
impl SessionProvider for ValidSessionProvider {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        Ok(Some(AuthSession {
            user_id: UserId::from("tester"),
            access_token: "token".to_string(),
            expires_at: chrono::Utc::now().timestamp() + 3_600,
        }))
    }
}

/// Row id of the `index`-th row
pub fn row_id_at(document: &Document, index: usize) -> RowId {
    document.rows[index].id
}

/// Read a row's text field from an engine document
pub fn field_text(document: &Document, row: RowId, field: &str) -> String {
    document.row(&row).map(|r| r.text(field).to_string()).unwrap_or_default()
}

/// Shorthand for a text field value
pub fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.to_string())
}
