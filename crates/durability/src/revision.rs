//! Revision history
//!
//! Revisions are full-content checkpoints written by the backing store;
//! the action log shown in the history panel is derived from consecutive
//! revision pairs. Restoring runs server-side through the store RPC so the
//! restored state is authoritative.

use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use cueline_core::{Document, DocumentId, Result, Row, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a stored revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionId(Uuid);

impl RevisionId {
    /// Create a new random RevisionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RevisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a revision was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionType {
    /// First revision of a new document
    Initial,
    /// Explicit user checkpoint
    Manual,
    /// Automatic checkpoint
    Auto,
    /// Safety checkpoint before a destructive wipe
    PreWipe,
    /// Safety checkpoint before a restore overwrites current state
    PreRestore,
    /// Interval checkpoint
    Periodic,
    /// Checkpoint cut because a different user started editing
    UserChange,
}

/// A full-content checkpoint of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Revision identifier
    pub id: RevisionId,
    /// Document this revision belongs to
    pub document_id: DocumentId,
    /// Position in the document's linear revision chain
    pub revision_number: u64,
    /// Why it was captured
    pub revision_type: RevisionType,
    /// Optional human-readable summary
    pub action_description: Option<String>,
    /// When it was captured
    pub created_at: DateTime<Utc>,
    /// Who triggered it, if known
    pub created_by: Option<UserId>,
    /// The full row list at capture time
    pub items: Vec<Row>,
    /// Title at capture time
    pub title: String,
    /// Start time at capture time
    pub start_time: Option<String>,
    /// Timezone at capture time
    pub timezone: Option<String>,
}

impl Revision {
    /// Capture the current document state as a revision
    pub fn capture(
        document: &Document,
        revision_number: u64,
        revision_type: RevisionType,
        created_by: Option<UserId>,
        action_description: Option<String>,
    ) -> Self {
        Self {
            id: RevisionId::new(),
            document_id: document.id,
            revision_number,
            revision_type,
            action_description,
            created_at: Utc::now(),
            created_by,
            items: document.rows.clone(),
            title: document.title.clone(),
            start_time: document.start_time.clone(),
            timezone: document.timezone.clone(),
        }
    }
}

/// One derived entry in the document's action log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEntry {
    /// Revision the entry describes (the newer of the pair)
    pub revision_number: u64,
    /// What changed, in display form
    pub description: String,
    /// When the newer revision was captured
    pub created_at: DateTime<Utc>,
    /// Who triggered it, if known
    pub created_by: Option<UserId>,
}

/// Describe the difference between two consecutive revisions
fn describe_change(prev: &Revision, next: &Revision) -> String {
    if let Some(description) = &next.action_description {
        return description.clone();
    }

    let prev_ids: BTreeSet<_> = prev.items.iter().map(|r| r.id).collect();
    let next_ids: BTreeSet<_> = next.items.iter().map(|r| r.id).collect();
    let added = next_ids.difference(&prev_ids).count();
    let removed = prev_ids.difference(&next_ids).count();

    let mut parts = Vec::new();
    if added > 0 {
        parts.push(format!("added {added} row(s)"));
    }
    if removed > 0 {
        parts.push(format!("removed {removed} row(s)"));
    }
    if prev.title != next.title {
        parts.push(format!("renamed to \"{}\"", next.title));
    }
    if parts.is_empty() {
        let prev_order: Vec<_> = prev.items.iter().map(|r| r.id).collect();
        let next_order: Vec<_> = next.items.iter().map(|r| r.id).collect();
        if prev_order != next_order {
            parts.push("reordered rows".to_string());
        } else {
            parts.push("edited content".to_string());
        }
    }
    parts.join(", ")
}

/// Derive the action log from a revision chain
///
/// Revisions are sorted by revision number; each consecutive pair yields one
/// entry describing what changed.
pub fn derive_action_log(revisions: &[Revision]) -> Vec<ActionLogEntry> {
    let mut sorted: Vec<&Revision> = revisions.iter().collect();
    sorted.sort_by_key(|r| r.revision_number);

    sorted
        .windows(2)
        .map(|pair| ActionLogEntry {
            revision_number: pair[1].revision_number,
            description: describe_change(pair[0], pair[1]),
            created_at: pair[1].created_at,
            created_by: pair[1].created_by.clone(),
        })
        .collect()
}

/// Restore a document from a stored revision, server-side
pub async fn restore_revision(
    store: &dyn DocumentStore,
    target: DocumentId,
    revision_id: RevisionId,
) -> Result<()> {
    store.restore_from_revision(target, revision_id).await
}
