//! Backend host state.
//!
//! # Responsibilities
//! - Represent a single backend host inside one strategy instance
//! - Track in-flight requests (for least-load and p2c strategies)
//! - Hold the decayed latency estimate (for p2c-ewma)
//! - Keep the ordered list and the name index of a host group in step

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// A single backend host.
///
/// Counters are atomics so `inc`/`done` can run under the pool's read lock
/// while other requests are balancing.
#[derive(Debug)]
pub struct HostEntity {
    name: String,
    /// Number of requests currently dispatched to this host.
    inflight: AtomicI64,
    /// Decayed latency estimate in nanoseconds. 0 means no sample yet.
    lag: AtomicU64,
    /// Pool-relative nanoseconds of the last completion. 0 means never.
    last: AtomicU64,
}

impl HostEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inflight: AtomicI64::new(0),
            lag: AtomicU64::new(0),
            last: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current number of in-flight requests.
    pub fn inflight(&self) -> i64 {
        self.inflight.load(Ordering::Relaxed)
    }

    /// Current latency estimate in nanoseconds.
    pub fn lag(&self) -> u64 {
        self.lag.load(Ordering::Relaxed)
    }

    /// Increment in-flight count.
    pub fn inc(&self) {
        self.inflight.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement in-flight count.
    pub fn done(&self) {
        self.inflight.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn store_lag(&self, lag: u64) {
        self.lag.store(lag, Ordering::Relaxed);
    }

    /// Swap the last-completion timestamp, returning the previous one.
    pub(crate) fn swap_last(&self, now: u64) -> u64 {
        self.last.swap(now, Ordering::Relaxed)
    }
}

/// The hosts of one backend group.
///
/// Entities live in both an ordered list (index-based random draws) and a
/// name index (O(1) lookup). Removal scans the list, which is fine for the
/// tens of hosts a route carries.
#[derive(Debug, Default)]
pub struct HostSet {
    hosts: Vec<Arc<HostEntity>>,
    by_name: HashMap<String, Arc<HostEntity>>,
}

impl HostSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a host. Returns false if it was already present.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.by_name.contains_key(name) {
            return false;
        }
        let host = Arc::new(HostEntity::new(name));
        self.hosts.push(host.clone());
        self.by_name.insert(name.to_string(), host);
        true
    }

    /// Remove a host. Returns false if it was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.by_name.remove(name).is_none() {
            return false;
        }
        if let Some(pos) = self.hosts.iter().position(|h| h.name() == name) {
            self.hosts.remove(pos);
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<HostEntity>> {
        self.by_name.get(name)
    }

    pub fn as_slice(&self) -> &[Arc<HostEntity>] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
