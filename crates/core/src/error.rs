//! Error types for the collaborative core
//!
//! A single unified error enum is shared across the workspace crates so the
//! host application handles one taxonomy: validation, apply failures,
//! conflicts, transport, auth, save failures, and unrecoverable states.

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CuelineError>;

/// Unified error type for all collaborative-core operations
#[derive(Debug, Error)]
pub enum CuelineError {
    /// Operation envelope or payload is malformed; rejected at submit and
    /// never logged
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation was rejected
        reason: String,
    },

    /// A transformed operation could no longer be applied (target missing,
    /// index out of bounds); the pending op is preserved for the next pass
    #[error("apply failed on {target}.{field}: {reason}")]
    ApplyFailed {
        /// Target the operation addressed
        target: String,
        /// Field the operation addressed
        field: String,
        /// What went wrong
        reason: String,
    },

    /// A referenced row does not exist in the document
    #[error("row not found: {row_id}")]
    RowNotFound {
        /// The missing row id
        row_id: String,
    },

    /// A conflict requires host-side resolution (manual strategy)
    #[error("unresolved conflict: {description}")]
    ConflictUnresolved {
        /// Human-readable description of the conflicting operations
        description: String,
    },

    /// A realtime channel or the WebSocket transport failed
    #[error("transport error: {message}")]
    Transport {
        /// Failure description
        message: String,
    },

    /// No valid session; writes are paused and reconnection is gated
    #[error("auth invalid: {message}")]
    AuthInvalid {
        /// Failure description
        message: String,
    },

    /// The backing store rejected a cell or structural write
    #[error("save failed after {attempts} attempt(s) on {context}: {message}")]
    SaveFailed {
        /// Which write failed (e.g. "row.field" or "structural:reorder")
        context: String,
        /// How many attempts were made
        attempts: u32,
        /// Failure description
        message: String,
    },

    /// Repeated failures exhausted every recovery path; the host should
    /// offer a reload
    #[error("unrecoverable: {message}")]
    Unrecoverable {
        /// Failure description
        message: String,
    },

    /// JSON (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected internal state; indicates a bug
    #[error("internal error: {message}")]
    Internal {
        /// Failure description
        message: String,
    },
}

impl CuelineError {
    /// Create an InvalidOperation error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        CuelineError::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Create an ApplyFailed error
    pub fn apply_failed(
        target: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CuelineError::ApplyFailed {
            target: target.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a RowNotFound error
    pub fn row_not_found(row_id: impl ToString) -> Self {
        CuelineError::RowNotFound {
            row_id: row_id.to_string(),
        }
    }

    /// Create a ConflictUnresolved error
    pub fn conflict(description: impl Into<String>) -> Self {
        CuelineError::ConflictUnresolved {
            description: description.into(),
        }
    }

    /// Create a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        CuelineError::Transport {
            message: message.into(),
        }
    }

    /// Create an AuthInvalid error
    pub fn auth(message: impl Into<String>) -> Self {
        CuelineError::AuthInvalid {
            message: message.into(),
        }
    }

    /// Create a SaveFailed error
    pub fn save_failed(
        context: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
    ) -> Self {
        CuelineError::SaveFailed {
            context: context.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Create an Unrecoverable error
    pub fn unrecoverable(message: impl Into<String>) -> Self {
        CuelineError::Unrecoverable {
            message: message.into(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        CuelineError::Internal {
            message: message.into(),
        }
    }

    /// Validation errors are local to the engine and never reach the
    /// transport
    pub fn is_validation(&self) -> bool {
        matches!(self, CuelineError::InvalidOperation { .. })
    }

    /// Retryable errors may succeed once connectivity or backing-store
    /// health returns
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CuelineError::Transport { .. }
                | CuelineError::SaveFailed { .. }
                | CuelineError::ApplyFailed { .. }
        )
    }

    /// Unrecoverable errors require host intervention (reload)
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, CuelineError::Unrecoverable { .. })
    }
}
