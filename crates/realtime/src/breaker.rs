//! Per-channel circuit breaker
//!
//! Closed → Open after the failure threshold; Open → HalfOpen once the open
//! window elapses; one successful trial closes it again, one failed trial
//! reopens it. Backoff between attempts grows exponentially up to a cap.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Breaker state machine positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing; attempts are rejected until the open window elapses
    Open,
    /// One trial attempt allowed
    HalfOpen,
}

/// Thresholds and timing for one breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a trial
    pub open_ms: u64,
    /// Base of the per-attempt backoff (doubles per failure)
    pub backoff_base_ms: u64,
    /// Backoff cap
    pub backoff_max_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_ms: 60_000,
            backoff_base_ms: 2_000,
            backoff_max_ms: 30_000,
        }
    }
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// A per-channel circuit breaker
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Current state, transitioning Open → HalfOpen when the window elapses
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .map_or(Duration::ZERO, |t| t.elapsed());
            if elapsed >= Duration::from_millis(self.config.open_ms) {
                inner.state = CircuitState::HalfOpen;
            }
        }
        inner.state
    }

    /// True if an attempt may proceed now
    pub fn allow_attempt(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// Consecutive failures recorded
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Backoff before the next attempt: `min(cap, base * 2^failures)`
    pub fn backoff(&self) -> Duration {
        let failures = self.failure_count().min(16);
        let exp = self
            .config
            .backoff_base_ms
            .saturating_mul(1_u64 << failures);
        Duration::from_millis(exp.min(self.config.backoff_max_ms))
    }

    /// Record a successful attempt: closes the breaker
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// Record a failed attempt; opens the breaker at the threshold and
    /// reopens it after a failed half-open trial
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;
        let tripped = inner.consecutive_failures >= self.config.failure_threshold
            || inner.state == CircuitState::HalfOpen;
        if tripped {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}
