//! The reconnection coordinator
//!
//! One pipeline per process at a time: auth gate, cooldown, transport probe,
//! forced transport reconnect with backoff, stabilization wait, registration
//! wait, staggered per-channel reconnect behind circuit breakers, and a
//! completion broadcast that lets paused subsystems (showcaller, the save
//! coordinator) resume. Wake-from-sleep and repeated channel errors funnel
//! into the same pipeline; a watchdog forces one extra pass when the
//! document stays offline too long.

use crate::auth::AuthMonitor;
use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::health::{ChannelKind, ConnectionState, HealthConfig, HealthTracker, HealthTransition};
use crate::transport::{ChannelSubscriber, ConnectionRegistry, Transport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Timing and threshold knobs for the coordinator
///
/// Defaults are the production values; tests inject millisecond-scale ones.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Skip the pipeline if another check ran inside this window
    pub cooldown_ms: u64,
    /// How long the auth gate waits for a valid session
    pub auth_wait_ms: u64,
    /// Poll interval inside the auth gate
    pub auth_poll_ms: u64,
    /// Settle delay after a transport reconnect before resubscribing
    pub transport_settle_ms: u64,
    /// Poll interval while waiting for channel registration
    pub registration_poll_ms: u64,
    /// Cap on the registration wait
    pub registration_wait_ms: u64,
    /// Gap between staggered per-channel reconnect starts
    pub reconnect_stagger_ms: u64,
    /// Delay after allConnected before reporting "connected"
    pub stabilization_ms: u64,
    /// Settle delay after a network-online event before probing
    pub wake_settle_ms: u64,
    /// Warn and force a pipeline pass after this long without allConnected
    pub stuck_offline_ms: u64,
    /// Same-channel errors inside this window are discarded
    pub error_cooldown_ms: u64,
    /// Failure cycles before escalating to unrecoverable
    pub max_cycle_failures: u32,
    /// Consecutive transport reconnect failures before unrecoverable
    pub max_transport_failures: u32,
    /// Transport failure counter resets after this long without a failure
    pub transport_failure_reset_ms: u64,
    /// Base of the transport reconnect backoff
    pub transport_backoff_base_ms: u64,
    /// Cap of the transport reconnect backoff
    pub transport_backoff_max_ms: u64,
    /// Health model knobs
    pub health: HealthConfig,
    /// Per-channel breaker knobs
    pub breaker: CircuitBreakerConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 5_000,
            auth_wait_ms: 10_000,
            auth_poll_ms: 250,
            transport_settle_ms: 2_500,
            registration_poll_ms: 500,
            registration_wait_ms: 5_000,
            reconnect_stagger_ms: 500,
            stabilization_ms: 500,
            wake_settle_ms: 1_000,
            stuck_offline_ms: 30_000,
            error_cooldown_ms: 5_000,
            max_cycle_failures: 15,
            max_transport_failures: 3,
            transport_failure_reset_ms: 300_000,
            transport_backoff_base_ms: 10_000,
            transport_backoff_max_ms: 60_000,
            health: HealthConfig::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// How a pipeline invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every channel reconnected and stabilized
    Completed,
    /// Some channels are still down (breakers open or resubscribes failed)
    Partial,
    /// Another pipeline was already running
    SkippedAlreadyRunning,
    /// A check ran too recently
    SkippedCooldown,
    /// Reconnection is stopped (signed out) or latched unrecoverable
    SkippedStopped,
    /// No valid session arrived inside the auth wait
    AuthAborted,
    /// The transport could not be re-established
    TransportFailed,
}

/// Events published by the coordinator
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// The pipeline finished with every channel connected; paused
    /// subsystems may resume
    ReconnectionComplete,
    /// One channel came back
    ChannelReconnected {
        /// Which channel
        channel: ChannelKind,
    },
    /// A repeated error on the same channel was discarded by the cooldown
    ChannelErrorDiscarded {
        /// Which channel
        channel: ChannelKind,
    },
    /// The stuck-offline watchdog fired
    StuckOffline,
    /// Recovery is exhausted; the host should offer a reload
    Unrecoverable {
        /// Why
        reason: String,
    },
}

struct TransportFailures {
    count: u32,
    last_failure: Option<Instant>,
}

struct CoordinatorInner {
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
    auth: Arc<AuthMonitor>,
    registry: ConnectionRegistry,
    health: HealthTracker,
    breakers: HashMap<ChannelKind, CircuitBreaker>,
    is_reconnecting: AtomicBool,
    stopped: AtomicBool,
    unrecoverable: AtomicBool,
    last_check: Mutex<Option<Instant>>,
    last_channel_error: Mutex<HashMap<ChannelKind, Instant>>,
    transport_failures: Mutex<TransportFailures>,
    last_all_connected: Mutex<Instant>,
    events: broadcast::Sender<RealtimeEvent>,
}

/// Coordinates recovery of the three realtime channels for one document
///
/// Cheap to clone; all clones share state. Exactly one pipeline runs at a
/// time process-wide for this document.
#[derive(Clone)]
pub struct ReconnectionCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl ReconnectionCoordinator {
    /// Create a coordinator over a transport and auth monitor
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: Arc<AuthMonitor>,
        config: RealtimeConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let breakers = ChannelKind::RECONNECT_ORDER
            .into_iter()
            .map(|kind| (kind, CircuitBreaker::new(config.breaker.clone())))
            .collect();
        let health = HealthTracker::new(config.health.clone());
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                transport,
                auth,
                registry: ConnectionRegistry::new(),
                health,
                breakers,
                is_reconnecting: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                unrecoverable: AtomicBool::new(false),
                last_check: Mutex::new(None),
                last_channel_error: Mutex::new(HashMap::new()),
                transport_failures: Mutex::new(TransportFailures {
                    count: 0,
                    last_failure: None,
                }),
                last_all_connected: Mutex::new(Instant::now()),
                events,
            }),
        }
    }

    /// Register a channel handler (replaces any prior one)
    pub fn register_channel(&self, kind: ChannelKind, subscriber: Arc<dyn ChannelSubscriber>) {
        self.inner.registry.register(kind, subscriber);
    }

    /// Remove a channel handler
    pub fn unregister_channel(&self, kind: ChannelKind) {
        self.inner.registry.unregister(kind);
    }

    /// Subscribe to coordinator events
    pub fn subscribe_events(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.inner.events.subscribe()
    }

    /// Watch the aggregate connection state
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.health.subscribe()
    }

    /// Current per-channel health
    pub fn health(&self) -> crate::health::ChannelHealth {
        self.inner.health.health()
    }

    /// Mark a channel as established (initial subscription succeeded)
    pub fn mark_channel_connected(&self, kind: ChannelKind) {
        if let HealthTransition::AllConnected = self.inner.health.set_channel(kind, true) {
            *self.inner.last_all_connected.lock() = Instant::now();
            let this = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(this.inner.config.stabilization_ms))
                    .await;
                this.inner.health.confirm_stable();
            });
        }
    }

    /// Funnel a channel error into the recovery pipeline
    ///
    /// Repeated errors from the same channel inside the cooldown window are
    /// discarded to prevent thrash.
    pub fn handle_channel_error(&self, kind: ChannelKind) {
        {
            let mut errors = self.inner.last_channel_error.lock();
            let now = Instant::now();
            if let Some(last) = errors.get(&kind) {
                if now.duration_since(*last)
                    < Duration::from_millis(self.inner.config.error_cooldown_ms)
                {
                    debug!(
                        target: "cueline::realtime",
                        channel = kind.as_str(),
                        "channel error discarded by cooldown"
                    );
                    let _ = self
                        .inner
                        .events
                        .send(RealtimeEvent::ChannelErrorDiscarded { channel: kind });
                    return;
                }
            }
            errors.insert(kind, now);
        }

        let transition = self.inner.health.set_channel(kind, false);
        if let HealthTransition::Degraded { new_cycle: true, .. } = transition {
            if self.inner.health.consecutive_failures() >= self.inner.config.max_cycle_failures {
                self.escalate_unrecoverable(format!(
                    "{} failure cycles without recovery",
                    self.inner.health.consecutive_failures()
                ));
                return;
            }
        }
        self.trigger();
    }

    /// Handle a network-online event (wake from sleep)
    ///
    /// Waits a settle delay, probes the transport, and ignores the event if
    /// the transport is alive (a network blip). Otherwise the full pipeline
    /// runs.
    pub fn handle_network_online(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(this.inner.config.wake_settle_ms)).await;
            if this.inner.transport.probe().await {
                debug!(target: "cueline::realtime", "network-online ignored: transport alive");
                return;
            }
            let _ = this.run_pipeline().await;
        });
    }

    /// Stop reconnecting (sign-out). A later `resume_reconnection` call
    /// re-enables the pipeline.
    pub fn stop_reconnection(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        info!(target: "cueline::realtime", "reconnection stopped");
    }

    /// Re-enable reconnection after sign-in
    pub fn resume_reconnection(&self) {
        self.inner.stopped.store(false, Ordering::SeqCst);
    }

    /// Wire this coordinator to the auth monitor: a session gates and
    /// triggers the pipeline; sign-out stops it
    pub fn attach_to_auth(&self) {
        let this = self.clone();
        self.inner.auth.add_listener(
            "reconnection-coordinator",
            Box::new(move |session| {
                if session.is_some() {
                    this.resume_reconnection();
                    this.trigger();
                } else {
                    this.stop_reconnection();
                }
            }),
        );
    }

    /// Spawn a pipeline pass in the background
    pub fn trigger(&self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let this = self.clone();
            handle.spawn(async move {
                let _ = this.run_pipeline().await;
            });
        }
    }

    /// Spawn the stuck-offline watchdog
    ///
    /// Surfaces a warning and forces one extra pipeline pass when the
    /// document has been without allConnected for the configured window.
    pub fn spawn_watchdog(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let window = Duration::from_millis(this.inner.config.stuck_offline_ms);
            let poll = window.min(Duration::from_millis(500)).max(Duration::from_millis(10));
            loop {
                tokio::time::sleep(poll).await;
                if this.inner.stopped.load(Ordering::SeqCst)
                    || this.inner.unrecoverable.load(Ordering::SeqCst)
                {
                    return;
                }
                if this.inner.health.health().all_connected() {
                    *this.inner.last_all_connected.lock() = Instant::now();
                    continue;
                }
                let stuck = this.inner.last_all_connected.lock().elapsed() >= window;
                if stuck {
                    warn!(target: "cueline::realtime", "stuck offline; forcing a pipeline pass");
                    let _ = this.inner.events.send(RealtimeEvent::StuckOffline);
                    *this.inner.last_all_connected.lock() = Instant::now();
                    let _ = this.run_pipeline().await;
                }
            }
        })
    }

    /// Run the reconnection pipeline once
    ///
    /// At most one pipeline runs at a time; a second call while one is in
    /// flight returns immediately.
    pub async fn run_pipeline(&self) -> PipelineOutcome {
        if self.inner.stopped.load(Ordering::SeqCst)
            || self.inner.unrecoverable.load(Ordering::SeqCst)
        {
            return PipelineOutcome::SkippedStopped;
        }
        if self.inner.is_reconnecting.swap(true, Ordering::SeqCst) {
            return PipelineOutcome::SkippedAlreadyRunning;
        }
        let outcome = self.pipeline_body().await;
        self.inner.is_reconnecting.store(false, Ordering::SeqCst);
        debug!(target: "cueline::realtime", ?outcome, "pipeline finished");
        outcome
    }

    async fn pipeline_body(&self) -> PipelineOutcome {
        let config = &self.inner.config;

        // 1. Auth gate: require a valid session, waiting out a refresh
        let deadline = Instant::now() + Duration::from_millis(config.auth_wait_ms);
        while !self.inner.auth.is_session_valid() {
            if Instant::now() >= deadline {
                warn!(target: "cueline::realtime", "pipeline aborted: no valid session");
                return PipelineOutcome::AuthAborted;
            }
            tokio::time::sleep(Duration::from_millis(config.auth_poll_ms)).await;
        }

        // 2. Cooldown: skip if another check ran recently
        {
            let mut last = self.inner.last_check.lock();
            if let Some(t) = *last {
                if t.elapsed() < Duration::from_millis(config.cooldown_ms) {
                    return PipelineOutcome::SkippedCooldown;
                }
            }
            *last = Some(Instant::now());
        }

        // 3. Transport probe; 4. forced reconnect with backoff on failure
        if !self.inner.transport.probe().await {
            if !self.reestablish_transport().await {
                return PipelineOutcome::TransportFailed;
            }
        }

        // 5. Stabilization wait: let the transport settle before
        //    resubscribing channels
        tokio::time::sleep(Duration::from_millis(config.transport_settle_ms)).await;

        // 6. Registration wait: handlers may not be wired yet on startup
        let deadline = Instant::now() + Duration::from_millis(config.registration_wait_ms);
        while !self.inner.registry.has_any() {
            if Instant::now() >= deadline {
                debug!(target: "cueline::realtime", "no channel handlers registered");
                return PipelineOutcome::Partial;
            }
            tokio::time::sleep(Duration::from_millis(config.registration_poll_ms)).await;
        }

        // 7. Staggered per-channel reconnect in fixed priority order
        for (i, kind) in ChannelKind::RECONNECT_ORDER.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(config.reconnect_stagger_ms)).await;
            }
            self.reconnect_channel(kind).await;
        }

        // 8. Stabilize, then broadcast completion so paused subsystems resume
        if self.inner.health.health().all_connected() {
            tokio::time::sleep(Duration::from_millis(config.stabilization_ms)).await;
            if self.inner.health.confirm_stable() {
                self.inner.health.reset_failures();
                *self.inner.last_all_connected.lock() = Instant::now();
                info!(target: "cueline::realtime", "reconnection complete");
                let _ = self.inner.events.send(RealtimeEvent::ReconnectionComplete);
                return PipelineOutcome::Completed;
            }
        }
        PipelineOutcome::Partial
    }

    /// Tear down and re-establish the transport, with failure accounting
    async fn reestablish_transport(&self) -> bool {
        let config = &self.inner.config;
        loop {
            match self.inner.transport.reconnect().await {
                Ok(()) => {
                    self.inner.transport_failures.lock().count = 0;
                    return true;
                }
                Err(e) => {
                    let failures = {
                        let mut failures = self.inner.transport_failures.lock();
                        let reset = failures.last_failure.map_or(false, |t| {
                            t.elapsed()
                                >= Duration::from_millis(config.transport_failure_reset_ms)
                        });
                        if reset {
                            failures.count = 0;
                        }
                        failures.count += 1;
                        failures.last_failure = Some(Instant::now());
                        failures.count
                    };
                    warn!(
                        target: "cueline::realtime",
                        failures,
                        error = %e,
                        "transport reconnect failed"
                    );
                    if failures >= config.max_transport_failures {
                        self.escalate_unrecoverable(format!(
                            "{failures} consecutive transport reconnect failures"
                        ));
                        return false;
                    }
                    let backoff = config
                        .transport_backoff_base_ms
                        .saturating_mul(1_u64 << (failures - 1).min(16))
                        .min(config.transport_backoff_max_ms);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
    }

    /// Reconnect one channel behind its circuit breaker
    async fn reconnect_channel(&self, kind: ChannelKind) -> bool {
        let Some(subscriber) = self.inner.registry.get(kind) else {
            return false;
        };
        let breaker = &self.inner.breakers[&kind];
        if !breaker.allow_attempt() {
            debug!(
                target: "cueline::realtime",
                channel = kind.as_str(),
                "skipped: circuit breaker open"
            );
            return false;
        }
        if breaker.failure_count() > 0 {
            tokio::time::sleep(breaker.backoff()).await;
        }

        match subscriber.resubscribe().await {
            Ok(()) => {
                breaker.record_success();
                self.inner.health.set_channel(kind, true);
                let _ = self
                    .inner
                    .events
                    .send(RealtimeEvent::ChannelReconnected { channel: kind });
                true
            }
            Err(e) => {
                breaker.record_failure();
                self.inner.health.set_channel(kind, false);
                warn!(
                    target: "cueline::realtime",
                    channel = kind.as_str(),
                    error = %e,
                    "channel resubscribe failed"
                );
                false
            }
        }
    }

    fn escalate_unrecoverable(&self, reason: String) {
        if self.inner.unrecoverable.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(target: "cueline::realtime", reason = %reason, "unrecoverable; asking host to reload");
        self.inner.health.mark_unrecoverable();
        let _ = self.inner.events.send(RealtimeEvent::Unrecoverable { reason });
    }

    /// True once the coordinator has latched the unrecoverable state
    pub fn is_unrecoverable(&self) -> bool {
        self.inner.unrecoverable.load(Ordering::SeqCst)
    }
}
