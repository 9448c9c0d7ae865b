//! Transformer integration tests
//!
//! Pairwise transform scenarios and the convergence properties that hold
//! for any pair of concurrent operations.

#[path = "../common/mod.rs"]
mod common;

mod pairwise;
mod properties;
