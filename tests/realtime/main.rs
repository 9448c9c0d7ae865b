//! Realtime reconnection integration tests

#[path = "../common/mod.rs"]
mod common;

mod recovery;
