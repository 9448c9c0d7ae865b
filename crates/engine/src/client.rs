//! Per-client state: operation queues and the local vector clock

use chrono::{DateTime, Utc};
use cueline_core::{Operation, OperationId, UserId, VectorClock};

/// Engine-side record for one collaborating client
///
/// Owned exclusively by the engine. `pending_operations` holds submitted but
/// unacknowledged operations; an operation moves to `acknowledged_operations`
/// once its apply succeeds.
#[derive(Debug)]
pub struct ClientState {
    /// The client's user id
    pub user_id: UserId,
    /// Full local history, in submission order
    pub local_operations: Vec<Operation>,
    /// Submitted but not yet acknowledged
    pub pending_operations: Vec<Operation>,
    /// Acknowledged (applied) operations
    pub acknowledged_operations: Vec<Operation>,
    /// The client's causality clock
    pub vector_clock: VectorClock,
    /// When the client registered
    pub registered_at: DateTime<Utc>,
    last_submitted_sequence: u64,
}

impl ClientState {
    /// Create a fresh client record
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            local_operations: Vec::new(),
            pending_operations: Vec::new(),
            acknowledged_operations: Vec::new(),
            vector_clock: VectorClock::new(),
            registered_at: Utc::now(),
            last_submitted_sequence: 0,
        }
    }

    /// The next per-user sequence number
    ///
    /// Monotonic across pending and acknowledged operations.
    pub fn next_sequence(&self) -> u64 {
        self.last_submitted_sequence
            .max(self.vector_clock.get(&self.user_id))
            + 1
    }

    /// Record a submission: history plus the pending queue
    pub fn note_submitted(&mut self, op: Operation) {
        self.last_submitted_sequence = self.last_submitted_sequence.max(op.id.sequence);
        self.local_operations.push(op.clone());
        self.pending_operations.push(op);
    }

    /// Acknowledge an operation: move it from pending to acknowledged and
    /// advance the clock component to `max(old, sequence)`
    pub fn acknowledge(&mut self, id: &OperationId) {
        if let Some(index) = self.pending_operations.iter().position(|op| &op.id == id) {
            let op = self.pending_operations.remove(index);
            self.vector_clock.record(&self.user_id, op.id.sequence);
            self.acknowledged_operations.push(op);
        }
    }

    /// Drop pending operations created before the cutoff, returning them
    ///
    /// Used by the cleanup sweep: a pending operation whose causal
    /// dependencies may have left the retention window is unrecoverable.
    pub fn abandon_pending_before(&mut self, cutoff_ms: i64) -> Vec<Operation> {
        let (stale, keep): (Vec<_>, Vec<_>) = self
            .pending_operations
            .drain(..)
            .partition(|op| op.timestamp < cutoff_ms);
        self.pending_operations = keep;
        stale
    }
}
