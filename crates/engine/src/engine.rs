//! The per-document OT engine
//!
//! Owns the document projection, the operation log, every client record, and
//! the advisory session tracker. Submissions are processed serially: the
//! whole submit path runs under one lock, so a local operation is always
//! acknowledged before a remote operation concurrent with it is ingested
//! and the local vector clock advances monotonically.

use crate::apply::apply_operation;
use crate::client::ClientState;
use crate::log::{OperationLog, OperationLogEntry};
use crate::session::{EditSession, SessionTracker};
use chrono::{DateTime, Duration, Utc};
use cueline_concurrency::{transform_against_all, BatchTransformed, Conflict, ConflictKind,
    ConflictResolution};
use cueline_core::{
    Document, EngineConfig, OpTarget, Operation, OperationKind, Result, SessionId, UserId,
    VectorClock,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Callback invoked after every successful apply
pub type AppliedCallback = Box<dyn Fn(&Operation) + Send + Sync>;
/// Callback invoked for every detected conflict
pub type ConflictCallback = Box<dyn Fn(&Conflict) + Send + Sync>;

/// Result of a successful submission
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// The operation as applied, post-transform
    pub operation: Operation,
    /// Its position in the engine's total order
    pub server_sequence: u64,
    /// Conflicts resolved while transforming
    pub conflicts: Vec<Conflict>,
}

/// Counter snapshot for monitoring
///
/// Counters use Relaxed ordering: they are observational only and never
/// synchronize other memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Operations offered to `submit`
    pub submitted: u64,
    /// Operations applied and logged
    pub applied: u64,
    /// Operations rejected by validation
    pub rejected: u64,
    /// Apply attempts that failed and left the op pending
    pub apply_failures: u64,
    /// Conflicts detected during transforms
    pub conflicts_detected: u64,
}

/// Point-in-time view of the engine's state
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    /// The current document projection
    pub data: Document,
    /// Retained log entries, in server order
    pub operations: Vec<OperationLogEntry>,
    /// Currently active advisory sessions
    pub active_sessions: Vec<EditSession>,
    /// Pointwise max over every registered client's clock
    pub vector_clock: VectorClock,
    /// When the document last changed
    pub last_updated: DateTime<Utc>,
}

/// Result of a cleanup sweep
#[derive(Debug, Clone)]
pub struct CleanupReport {
    /// Log entries dropped by retention
    pub removed_log_entries: usize,
    /// Sessions dropped by retention
    pub removed_sessions: usize,
    /// Pending operations abandoned as unrecoverable
    pub abandoned_operations: Vec<Operation>,
}

struct EngineState {
    document: Document,
    log: OperationLog,
    clients: HashMap<UserId, ClientState>,
    sessions: SessionTracker,
    last_updated: DateTime<Utc>,
}

/// The operational-transform engine for one document
pub struct OtEngine {
    config: EngineConfig,
    state: Mutex<EngineState>,
    submitted: AtomicU64,
    applied: AtomicU64,
    rejected: AtomicU64,
    apply_failures: AtomicU64,
    conflicts_detected: AtomicU64,
    on_applied: RwLock<Option<AppliedCallback>>,
    on_conflict: RwLock<Option<ConflictCallback>>,
}

impl OtEngine {
    /// Attach an engine to a document
    pub fn new(document: Document, config: EngineConfig) -> Self {
        Self {
            config,
            state: Mutex::new(EngineState {
                document,
                log: OperationLog::new(),
                clients: HashMap::new(),
                sessions: SessionTracker::new(),
                last_updated: Utc::now(),
            }),
            submitted: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            apply_failures: AtomicU64::new(0),
            conflicts_detected: AtomicU64::new(0),
            on_applied: RwLock::new(None),
            on_conflict: RwLock::new(None),
        }
    }

    /// Replace the applied-operation callback
    pub fn set_on_operation_applied(&self, callback: AppliedCallback) {
        *self.on_applied.write() = Some(callback);
    }

    /// Replace the conflict callback
    pub fn set_on_conflict_detected(&self, callback: ConflictCallback) {
        *self.on_conflict.write() = Some(callback);
    }

    /// Register a client on session start
    pub fn register_client(&self, user_id: UserId) {
        let mut state = self.state.lock();
        state
            .clients
            .entry(user_id.clone())
            .or_insert_with(|| ClientState::new(user_id));
    }

    /// Remove a client on sign-out or close
    pub fn unregister_client(&self, user_id: &UserId) {
        self.state.lock().clients.remove(user_id);
    }

    /// The (sequence, vector clock) basis for a client's next operation
    ///
    /// The clock reflects everything this replica has observed, so a new
    /// operation is causally after every already-applied one.
    pub fn operation_basis(&self, user_id: &UserId) -> (u64, VectorClock) {
        let mut state = self.state.lock();
        let merged = Self::merged_clock(&state);
        let client = state
            .clients
            .entry(user_id.clone())
            .or_insert_with(|| ClientState::new(user_id.clone()));
        (client.next_sequence(), merged)
    }

    fn merged_clock(state: &EngineState) -> VectorClock {
        let mut clock = VectorClock::new();
        for client in state.clients.values() {
            clock.merge(&client.vector_clock);
        }
        // Pending/just-applied ops may be ahead of the client clocks
        for entry in state.log.iter() {
            clock.merge(&entry.operation.vector_clock);
        }
        clock
    }

    /// Submit a local operation
    ///
    /// Validates, transforms against the concurrent set in server-log order,
    /// applies, logs, and acknowledges. On apply failure the operation stays
    /// pending for a later `retry_pending` pass.
    pub fn submit(&self, op: Operation) -> Result<SubmitOutcome> {
        if let Err(e) = op.validate() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let (outcome, conflicts) = {
            let mut state = self.state.lock();
            state
                .clients
                .entry(op.user_id.clone())
                .or_insert_with(|| ClientState::new(op.user_id.clone()))
                .note_submitted(op.clone());
            self.process_locked(&mut state, op)
        };

        self.emit(&outcome, &conflicts);
        outcome
    }

    /// Ingest an operation that arrived over the wire
    ///
    /// Identical to `submit`, with the originating client's user id.
    pub fn ingest_remote(&self, op: Operation) -> Result<SubmitOutcome> {
        self.submit(op)
    }

    /// Re-run pending operations after an apply failure
    ///
    /// Returns the number of operations that applied this pass.
    pub fn retry_pending(&self, user_id: &UserId) -> usize {
        let pending: Vec<Operation> = {
            let state = self.state.lock();
            match state.clients.get(user_id) {
                Some(client) => client.pending_operations.clone(),
                None => return 0,
            }
        };

        let mut applied = 0;
        for op in pending {
            let (outcome, conflicts) = {
                let mut state = self.state.lock();
                self.process_locked(&mut state, op)
            };
            if outcome.is_ok() {
                applied += 1;
            }
            self.emit(&outcome, &conflicts);
        }
        applied
    }

    /// Transform, apply, log, acknowledge. Caller holds the state lock and
    /// has already recorded the op as pending.
    fn process_locked(
        &self,
        state: &mut EngineState,
        op: Operation,
    ) -> (Result<SubmitOutcome>, Vec<Conflict>) {
        let concurrent: Vec<Operation> = state
            .log
            .concurrent_with(&op)
            .into_iter()
            .cloned()
            .collect();
        let refs: Vec<&Operation> = concurrent.iter().collect();
        let BatchTransformed {
            operation,
            transformed_against,
            conflicts,
        } = transform_against_all(&op, &refs, &self.config);

        match apply_operation(&mut state.document, &operation) {
            Ok(()) => {
                let server_sequence = state
                    .log
                    .append(operation.clone(), transformed_against.into_iter().collect());
                if let Some(client) = state.clients.get_mut(&op.user_id) {
                    client.acknowledge(&op.id);
                }
                state.last_updated = Utc::now();
                self.applied.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target: "cueline::engine",
                    user = %op.user_id,
                    kind = op.kind.name(),
                    server_sequence,
                    "operation applied"
                );
                (
                    Ok(SubmitOutcome {
                        operation,
                        server_sequence,
                        conflicts: conflicts.clone(),
                    }),
                    conflicts,
                )
            }
            Err(e) => {
                self.apply_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "cueline::engine",
                    user = %op.user_id,
                    kind = op.kind.name(),
                    error = %e,
                    "apply failed; operation left pending"
                );
                (Err(e), conflicts)
            }
        }
    }

    fn emit(&self, outcome: &Result<SubmitOutcome>, conflicts: &[Conflict]) {
        self.conflicts_detected
            .fetch_add(conflicts.len() as u64, Ordering::Relaxed);
        if let Ok(outcome) = outcome {
            if let Some(callback) = self.on_applied.read().as_ref() {
                callback(&outcome.operation);
            }
        }
        if let Some(callback) = self.on_conflict.read().as_ref() {
            for conflict in conflicts {
                callback(conflict);
            }
        }
    }

    /// Start an advisory edit session
    pub fn start_edit_session(
        &self,
        user_id: UserId,
        target: OpTarget,
        field: impl Into<String>,
        initial_value: Option<String>,
    ) -> SessionId {
        self.state
            .lock()
            .sessions
            .start(user_id, target, field, initial_value)
    }

    /// Refresh a session's activity window
    pub fn update_session_activity(&self, session_id: &SessionId, value: Option<String>) -> bool {
        self.state.lock().sessions.update_activity(session_id, value)
    }

    /// End an advisory edit session
    pub fn end_edit_session(&self, session_id: &SessionId) -> Option<EditSession> {
        self.state.lock().sessions.end(session_id)
    }

    /// True if another user has an active session on (target, field)
    pub fn is_field_being_edited(
        &self,
        target: &OpTarget,
        field: &str,
        exclude_user: Option<&UserId>,
    ) -> bool {
        self.state
            .lock()
            .sessions
            .is_field_being_edited(target, field, exclude_user)
    }

    /// Current document projection
    pub fn document(&self) -> Document {
        self.state.lock().document.clone()
    }

    /// Pending (unacknowledged) operation count for a client
    pub fn pending_count(&self, user_id: &UserId) -> usize {
        self.state
            .lock()
            .clients
            .get(user_id)
            .map_or(0, |client| client.pending_operations.len())
    }

    /// Point-in-time snapshot of document, log, sessions, and merged clock
    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.lock();
        EngineSnapshot {
            data: state.document.clone(),
            operations: state.log.iter().cloned().collect(),
            active_sessions: state.sessions.active_sessions(),
            vector_clock: Self::merged_clock(&state),
            last_updated: state.last_updated,
        }
    }

    /// Counter snapshot
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            apply_failures: self.apply_failures.load(Ordering::Relaxed),
            conflicts_detected: self.conflicts_detected.load(Ordering::Relaxed),
        }
    }

    /// Periodic sweep: prune the log and sessions past retention, abandon
    /// pending operations whose causal dependencies may have been pruned
    ///
    /// Abandoned operations are unrecoverable and surface through the
    /// conflict callback rather than being silently dropped.
    pub fn cleanup(&self) -> CleanupReport {
        let retention = Duration::milliseconds(self.config.log_retention_ms as i64);
        let cutoff = Utc::now() - retention;
        let cutoff_ms = Utc::now().timestamp_millis() - self.config.log_retention_ms as i64;

        let (removed_log_entries, removed_sessions, abandoned) = {
            let mut state = self.state.lock();
            let removed_log = state.log.prune_before(cutoff);
            let removed_sessions = state.sessions.prune_before(cutoff);
            let mut abandoned = Vec::new();
            for client in state.clients.values_mut() {
                abandoned.extend(client.abandon_pending_before(cutoff_ms));
            }
            (removed_log, removed_sessions, abandoned)
        };

        if !abandoned.is_empty() {
            if let Some(callback) = self.on_conflict.read().as_ref() {
                for op in &abandoned {
                    let kind = match op.kind {
                        OperationKind::FieldUpdate { .. } => ConflictKind::FieldUpdate,
                        _ if op.kind.is_structural() => ConflictKind::Structural,
                        _ => ConflictKind::TextOverlap,
                    };
                    callback(&Conflict {
                        kind,
                        resolution: ConflictResolution::Manual,
                        local: op.id.clone(),
                        remote: op.id.clone(),
                        description: format!(
                            "pending {} on {}.{} abandoned: unresolved past the retention window",
                            op.kind.name(),
                            op.target,
                            op.field
                        ),
                    });
                }
            }
        }

        CleanupReport {
            removed_log_entries,
            removed_sessions,
            abandoned_operations: abandoned,
        }
    }

    /// The engine's configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl OtEngine {
    /// Convenience used by hosts and tests: build and submit an operation
    /// in one call, deriving sequence and clock from the client state
    pub fn submit_local(
        &self,
        user_id: &UserId,
        target: OpTarget,
        field: &str,
        kind: OperationKind,
    ) -> Result<SubmitOutcome> {
        let (sequence, clock) = self.operation_basis(user_id);
        let op = Operation::create(
            user_id.clone(),
            sequence,
            clock,
            target,
            field,
            Utc::now().timestamp_millis(),
            kind,
        );
        self.submit(op)
    }
}
