//! The per-document operation log
//!
//! Append-only within the retention window. Every applied operation gets a
//! fresh server sequence; entries record which prior entries the operation
//! was transformed against. A periodic sweep prunes entries older than the
//! retention window (the durable history lives in the backing store).

use chrono::{DateTime, Utc};
use cueline_core::{Operation, OperationId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One applied operation in the log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationLogEntry {
    /// The operation as applied (post-transform)
    pub operation: Operation,
    /// When the engine applied it
    pub applied_at: DateTime<Utc>,
    /// Total order assigned by this engine
    pub server_sequence: u64,
    /// Envelope ids of the entries it was transformed against
    pub transformed_against: HashSet<OperationId>,
}

/// Append-only operation log with rolling retention
#[derive(Debug, Default)]
pub struct OperationLog {
    entries: Vec<OperationLogEntry>,
    next_server_sequence: u64,
}

impl OperationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_server_sequence: 1,
        }
    }

    /// Append an applied operation, assigning the next server sequence
    pub fn append(
        &mut self,
        operation: Operation,
        transformed_against: HashSet<OperationId>,
    ) -> u64 {
        let server_sequence = self.next_server_sequence;
        self.next_server_sequence += 1;
        self.entries.push(OperationLogEntry {
            operation,
            applied_at: Utc::now(),
            server_sequence,
            transformed_against,
        });
        server_sequence
    }

    /// All logged operations concurrent with `op`, in server order
    pub fn concurrent_with(&self, op: &Operation) -> Vec<&Operation> {
        self.entries
            .iter()
            .filter(|entry| entry.operation.concurrent_with(op))
            .map(|entry| &entry.operation)
            .collect()
    }

    /// Entries with a server sequence greater than `after`
    pub fn entries_since(&self, after: u64) -> impl Iterator<Item = &OperationLogEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.server_sequence > after)
    }

    /// Drop entries applied before the cutoff; returns how many were removed
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.applied_at >= cutoff);
        before - self.entries.len()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries are retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate retained entries in server order
    pub fn iter(&self) -> impl Iterator<Item = &OperationLogEntry> {
        self.entries.iter()
    }
}
