//! Transport and channel seams
//!
//! The coordinator never talks to a concrete realtime provider. It drives a
//! `Transport` (the shared WebSocket) and a set of registered
//! `ChannelSubscriber`s (one per logical channel) through these traits.

use crate::health::ChannelKind;
use async_trait::async_trait;
use cueline_core::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// The shared WebSocket transport beneath all channels
#[async_trait]
pub trait Transport: Send + Sync {
    /// Health-check the transport; absence of an affirmative answer within
    /// the probe interval counts as dead
    async fn probe(&self) -> bool;

    /// Tear down and re-establish the transport
    async fn reconnect(&self) -> Result<()>;
}

/// One logical channel's subscription handle
#[async_trait]
pub trait ChannelSubscriber: Send + Sync {
    /// Re-establish the channel subscription on the current transport
    async fn resubscribe(&self) -> Result<()>;
}

/// Registry of channel handlers for one document
///
/// Mutated only by register/unregister; readers take a snapshot.
#[derive(Default)]
pub struct ConnectionRegistry {
    channels: Mutex<HashMap<ChannelKind, Arc<dyn ChannelSubscriber>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a channel handler
    pub fn register(&self, kind: ChannelKind, subscriber: Arc<dyn ChannelSubscriber>) {
        self.channels.lock().insert(kind, subscriber);
    }

    /// Remove a channel handler
    pub fn unregister(&self, kind: ChannelKind) {
        self.channels.lock().remove(&kind);
    }

    /// Snapshot one handler
    pub fn get(&self, kind: ChannelKind) -> Option<Arc<dyn ChannelSubscriber>> {
        self.channels.lock().get(&kind).cloned()
    }

    /// True once any handler is registered
    pub fn has_any(&self) -> bool {
        !self.channels.lock().is_empty()
    }

    /// Kinds currently registered
    pub fn registered(&self) -> Vec<ChannelKind> {
        self.channels.lock().keys().copied().collect()
    }
}
