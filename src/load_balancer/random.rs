//! Uniform random load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{host::HostEntity, Selector, RANDOM};

/// Picks any host with equal probability.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for Random {
    const NAME: &'static str = RANDOM;

    fn select(&self, hosts: &[Arc<HostEntity>], _key: &str) -> usize {
        fastrand::usize(..hosts.len())
    }
}
