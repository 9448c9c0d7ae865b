//! Realtime health and reconnection for collaborative rundowns
//!
//! Three logical channels per document (`consolidated`, `cell`,
//! `showcaller`) ride one WebSocket transport. This crate tracks their
//! health, recovers them through a single gated pipeline with staggered
//! restarts and per-channel circuit breakers, and validates auth session
//! transitions that gate every reconnect and write.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod breaker;
pub mod coordinator;
pub mod health;
pub mod transport;

pub use auth::{AuthEvent, AuthListener, AuthMonitor, AuthSession, SessionProvider};
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use coordinator::{
    PipelineOutcome, RealtimeConfig, RealtimeEvent, ReconnectionCoordinator,
};
pub use health::{
    ChannelHealth, ChannelKind, ConnectionState, HealthConfig, HealthTracker, HealthTransition,
};
pub use transport::{ChannelSubscriber, ConnectionRegistry, Transport};
