//! Vector clocks for causality tracking
//!
//! Every operation carries a per-document map of userId → sequence number.
//! Comparing two clocks over the union of known users decides whether one
//! operation happened before the other or whether the two are concurrent.

use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Causal relationship between two vector clocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    /// Left happens-before right
    Before,
    /// Right happens-before left
    After,
    /// Identical clocks
    Equal,
    /// Neither happens-before the other
    Concurrent,
}

/// Per-document map of userId → highest observed sequence
///
/// A clock component that is absent reads as zero, so clocks from clients
/// that have never seen each other still compare correctly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock(BTreeMap<UserId, u64>);

impl VectorClock {
    /// Create an empty clock
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// The sequence component for a user (absent reads as 0)
    pub fn get(&self, user: &UserId) -> u64 {
        self.0.get(user).copied().unwrap_or(0)
    }

    /// Record an observed sequence for a user, keeping the max
    pub fn record(&mut self, user: &UserId, sequence: u64) {
        let entry = self.0.entry(user.clone()).or_insert(0);
        if sequence > *entry {
            *entry = sequence;
        }
    }

    /// Advance a user's component by one and return the new value
    pub fn increment(&mut self, user: &UserId) -> u64 {
        let entry = self.0.entry(user.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Pointwise max with another clock
    pub fn merge(&mut self, other: &VectorClock) {
        for (user, seq) in &other.0 {
            self.record(user, *seq);
        }
    }

    /// Compare element-wise over the union of known users
    ///
    /// Left happens-before right iff every component of left ≤ right's and
    /// at least one is strictly less. Clocks that disagree in both
    /// directions are concurrent.
    pub fn compare(&self, other: &VectorClock) -> CausalOrder {
        let users: BTreeSet<&UserId> = self.0.keys().chain(other.0.keys()).collect();

        let mut less = false;
        let mut greater = false;
        for user in users {
            let a = self.get(user);
            let b = other.get(user);
            if a < b {
                less = true;
            } else if a > b {
                greater = true;
            }
        }

        match (less, greater) {
            (false, false) => CausalOrder::Equal,
            (true, false) => CausalOrder::Before,
            (false, true) => CausalOrder::After,
            (true, true) => CausalOrder::Concurrent,
        }
    }

    /// True if the two clocks are concurrent
    pub fn concurrent_with(&self, other: &VectorClock) -> bool {
        self.compare(other) == CausalOrder::Concurrent
    }

    /// Iterate over the known (user, sequence) components
    pub fn components(&self) -> impl Iterator<Item = (&UserId, u64)> {
        self.0.iter().map(|(u, s)| (u, *s))
    }

    /// True if no component has been recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(UserId, u64)> for VectorClock {
    fn from_iter<T: IntoIterator<Item = (UserId, u64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
