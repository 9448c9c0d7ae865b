//! Channel health model
//!
//! Three logical channels per document: `consolidated` (authoritative row
//! changes), `cell` (fine-grained field broadcast), and `showcaller`
//! (ephemeral playback state). The tracker derives the aggregate state,
//! debounces failure bursts into single cycles, suppresses degraded
//! reporting during startup grace, and holds "connected" back until a
//! stabilization delay has passed.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;

/// One of the three realtime channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Authoritative row-change notifications from the backing store
    Consolidated,
    /// Per-field fine-grained broadcast for immediate UI feedback
    Cell,
    /// Ephemeral playback-state broadcast
    Showcaller,
}

impl ChannelKind {
    /// Reconnection priority order: authoritative data first
    pub const RECONNECT_ORDER: [ChannelKind; 3] = [
        ChannelKind::Consolidated,
        ChannelKind::Cell,
        ChannelKind::Showcaller,
    ];

    /// Wire name of this channel
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Consolidated => "consolidated",
            ChannelKind::Cell => "cell",
            ChannelKind::Showcaller => "showcaller",
        }
    }
}

/// Per-channel connected flags with derived aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelHealth {
    /// Consolidated channel connected
    pub consolidated: bool,
    /// Showcaller channel connected
    pub showcaller: bool,
    /// Cell channel connected
    pub cell: bool,
}

impl ChannelHealth {
    /// Read one channel's flag
    pub fn get(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Consolidated => self.consolidated,
            ChannelKind::Cell => self.cell,
            ChannelKind::Showcaller => self.showcaller,
        }
    }

    /// Set one channel's flag
    pub fn set(&mut self, kind: ChannelKind, connected: bool) {
        match kind {
            ChannelKind::Consolidated => self.consolidated = connected,
            ChannelKind::Cell => self.cell = connected,
            ChannelKind::Showcaller => self.showcaller = connected,
        }
    }

    /// Every channel connected
    pub fn all_connected(&self) -> bool {
        self.consolidated && self.showcaller && self.cell
    }

    /// At least one channel disconnected
    pub fn any_disconnected(&self) -> bool {
        !self.all_connected()
    }
}

/// Aggregate connection state reported to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Initial subscriptions still being established
    Connecting,
    /// All channels connected and stabilized
    Connected,
    /// One or more channels down
    Degraded,
    /// Recovery exhausted; the host should offer a reload
    Unrecoverable,
}

/// Timing knobs for the health model
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Failures inside this window count as one cycle
    pub debounce_ms: u64,
    /// Degraded reporting suppressed this long after startup
    pub startup_grace_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 3_000,
            startup_grace_ms: 5_000,
        }
    }
}

/// What a health update amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    /// All channels just became connected; await stabilization then call
    /// `confirm_stable`
    AllConnected,
    /// A channel went down
    Degraded {
        /// True if this failure started a new cycle (outside the debounce
        /// window of the previous one)
        new_cycle: bool,
        /// True if startup grace suppressed the degraded report
        suppressed_by_grace: bool,
    },
    /// No aggregate change
    Unchanged,
}

struct HealthInner {
    health: ChannelHealth,
    consecutive_failures: u32,
    last_failure_cycle: Option<Instant>,
    stabilizing: bool,
}

/// Tracks per-channel health and publishes the aggregate state
pub struct HealthTracker {
    config: HealthConfig,
    started_at: Instant,
    inner: Mutex<HealthInner>,
    state_tx: watch::Sender<ConnectionState>,
}

impl HealthTracker {
    /// Create a tracker in the Connecting state
    pub fn new(config: HealthConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        Self {
            config,
            started_at: Instant::now(),
            inner: Mutex::new(HealthInner {
                health: ChannelHealth::default(),
                consecutive_failures: 0,
                last_failure_cycle: None,
                stabilizing: false,
            }),
            state_tx,
        }
    }

    /// Watch the aggregate connection state
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Current aggregate state
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Current per-channel flags
    pub fn health(&self) -> ChannelHealth {
        self.inner.lock().health
    }

    /// Failure cycles since the last reset
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// True between all-connected and stabilization confirmation
    pub fn is_stabilizing(&self) -> bool {
        self.inner.lock().stabilizing
    }

    /// Record a channel transition
    pub fn set_channel(&self, kind: ChannelKind, connected: bool) -> HealthTransition {
        let mut inner = self.inner.lock();
        inner.health.set(kind, connected);

        if connected {
            if inner.health.all_connected() {
                inner.stabilizing = true;
                debug!(target: "cueline::realtime", "all channels connected; stabilizing");
                return HealthTransition::AllConnected;
            }
            return HealthTransition::Unchanged;
        }

        inner.stabilizing = false;
        let now = Instant::now();
        let new_cycle = inner
            .last_failure_cycle
            .map_or(true, |t| now.duration_since(t) >= Duration::from_millis(self.config.debounce_ms));
        if new_cycle {
            inner.consecutive_failures += 1;
            inner.last_failure_cycle = Some(now);
        }

        let suppressed_by_grace =
            self.started_at.elapsed() < Duration::from_millis(self.config.startup_grace_ms);
        if !suppressed_by_grace {
            let _ = self.state_tx.send(ConnectionState::Degraded);
        }
        debug!(
            target: "cueline::realtime",
            channel = kind.as_str(),
            new_cycle,
            suppressed_by_grace,
            failures = inner.consecutive_failures,
            "channel disconnected"
        );
        HealthTransition::Degraded {
            new_cycle,
            suppressed_by_grace,
        }
    }

    /// Publish Connected if all channels are still up after the
    /// stabilization delay; returns whether the state was published
    pub fn confirm_stable(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.health.all_connected() {
            inner.stabilizing = false;
            let _ = self.state_tx.send(ConnectionState::Connected);
            true
        } else {
            false
        }
    }

    /// Clear the failure accounting after a full recovery
    pub fn reset_failures(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = 0;
        inner.last_failure_cycle = None;
    }

    /// Latch the terminal state
    pub fn mark_unrecoverable(&self) {
        let _ = self.state_tx.send(ConnectionState::Unrecoverable);
    }
}
