//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{host::HostEntity, Selector, ROUND_ROBIN};

/// Round-robin selector.
/// Stores an internal counter to rotate through hosts. The counter wraps
/// modulo the host count at the time of each call, so it stays valid
/// while hosts come and go.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    const NAME: &'static str = ROUND_ROBIN;

    fn select(&self, hosts: &[Arc<HostEntity>], _key: &str) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed) % hosts.len()
    }
}
