//! Advisory edit sessions (soft locks)
//!
//! Sessions announce "someone is typing in this field" for presence UI. A
//! session is active while its last activity is within the 30 s window.
//! Sessions never block writes.

use chrono::{DateTime, Duration, Utc};
use cueline_core::{OpTarget, SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Activity window after which a session stops counting as active
pub const SESSION_ACTIVITY_WINDOW_MS: i64 = 30_000;

/// One advisory per-field editing session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSession {
    /// Session identifier
    pub session_id: SessionId,
    /// Who is editing
    pub user_id: UserId,
    /// Document or row being edited
    pub target: OpTarget,
    /// Field being edited
    pub field: String,
    /// When the session started
    pub start_time: DateTime<Utc>,
    /// Last keystroke or explicit activity ping
    pub last_activity: DateTime<Utc>,
    /// The in-progress value, if the client shares it
    pub current_value: Option<String>,
    /// Selection anchor, if shared
    pub selection_start: Option<usize>,
    /// Selection head, if shared
    pub selection_end: Option<usize>,
}

impl EditSession {
    /// True while `now - last_activity` is inside the activity window
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now - self.last_activity < Duration::milliseconds(SESSION_ACTIVITY_WINDOW_MS)
    }
}

/// Registry of advisory sessions for one document
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<SessionId, EditSession>,
}

impl SessionTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and return its id
    pub fn start(
        &mut self,
        user_id: UserId,
        target: OpTarget,
        field: impl Into<String>,
        initial_value: Option<String>,
    ) -> SessionId {
        let session_id = SessionId::new();
        let now = Utc::now();
        self.sessions.insert(
            session_id,
            EditSession {
                session_id,
                user_id,
                target,
                field: field.into(),
                start_time: now,
                last_activity: now,
                current_value: initial_value,
                selection_start: None,
                selection_end: None,
            },
        );
        session_id
    }

    /// Refresh a session's activity, optionally updating the shared value
    ///
    /// Returns false if the session is unknown (already ended or expired).
    pub fn update_activity(&mut self, session_id: &SessionId, value: Option<String>) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(session) => {
                session.last_activity = Utc::now();
                if value.is_some() {
                    session.current_value = value;
                }
                true
            }
            None => false,
        }
    }

    /// End a session, returning it if it existed
    pub fn end(&mut self, session_id: &SessionId) -> Option<EditSession> {
        self.sessions.remove(session_id)
    }

    /// True if any active session covers (target, field), excluding a user
    pub fn is_field_being_edited(
        &self,
        target: &OpTarget,
        field: &str,
        exclude_user: Option<&UserId>,
    ) -> bool {
        let now = Utc::now();
        self.sessions.values().any(|session| {
            session.is_active(now)
                && &session.target == target
                && session.field == field
                && exclude_user.map_or(true, |user| &session.user_id != user)
        })
    }

    /// All currently active sessions
    pub fn active_sessions(&self) -> Vec<EditSession> {
        let now = Utc::now();
        self.sessions
            .values()
            .filter(|session| session.is_active(now))
            .cloned()
            .collect()
    }

    /// Drop sessions whose last activity predates the cutoff
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.last_activity >= cutoff);
        before - self.sessions.len()
    }

    /// Number of tracked sessions, active or not
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True if no sessions are tracked
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
