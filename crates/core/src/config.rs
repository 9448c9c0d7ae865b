//! Engine configuration
//!
//! Conflict-resolution strategies and timing knobs, delivered as one typed
//! object at construction. Unknown keys are rejected when deserializing so
//! host configuration cannot silently drift.

use crate::error::{CuelineError, Result};
use serde::{Deserialize, Serialize};

/// How overlapping text_replace operations are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextConflictStrategy {
    /// Concatenate both replacements separated by " | "
    Merge,
    /// The later (timestamp, userId) operation wins; the loser no-ops
    PreferLatest,
    /// The longer replacement wins; ties fall back to latest
    PreferLongest,
    /// Leave the operation unchanged and surface the conflict to the host
    Manual,
}

/// How concurrent field_update operations are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldConflictStrategy {
    /// The later operation wins; the earlier one reverts to its old value
    PreferLatest,
    /// The local operation wins regardless of timestamps
    PreferLocal,
    /// Surface both values to the host
    Manual,
}

/// How conflicting structural operations are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralConflictStrategy {
    /// The later operation wins
    PreferLatest,
    /// Surface the conflict to the host
    Manual,
}

/// Engine configuration object
///
/// All durations are milliseconds. `Default` carries the production values;
/// tests inject shorter ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Resolution for overlapping text replacements
    pub text_conflicts: TextConflictStrategy,
    /// Resolution for concurrent field updates
    pub field_conflicts: FieldConflictStrategy,
    /// Resolution for conflicting structural operations
    pub structural_conflicts: StructuralConflictStrategy,
    /// How long a manual conflict may stay unresolved before auto-resolving
    pub auto_resolve_timeout_ms: u64,
    /// Rolling retention window for the in-memory operation log
    pub log_retention_ms: u64,
    /// Debounce for per-cell saves
    pub cell_debounce_ms: u64,
    /// Delay after allConnected before reporting "connected"
    pub stabilization_ms: u64,
    /// Gap between staggered per-channel reconnects
    pub reconnect_stagger_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            text_conflicts: TextConflictStrategy::PreferLatest,
            field_conflicts: FieldConflictStrategy::PreferLatest,
            structural_conflicts: StructuralConflictStrategy::PreferLatest,
            auto_resolve_timeout_ms: 10_000,
            log_retention_ms: 3_600_000,
            cell_debounce_ms: 300,
            stabilization_ms: 500,
            reconnect_stagger_ms: 500,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration object, rejecting unknown keys
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            CuelineError::invalid_operation(format!("invalid engine config: {e}"))
        })
    }
}
