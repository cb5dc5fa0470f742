//! Power of two random choices by in-flight count.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{host::HostEntity, Selector, P2C};

/// Draw two distinct indices uniformly from `[0, n)`. Requires `n >= 2`.
///
/// The second draw is taken over `n - 1` slots and shifted past the first,
/// so no rejection loop is needed.
pub(crate) fn draw_pair<R: Rng + ?Sized>(rng: &mut R, n: usize) -> (usize, usize) {
    let a = rng.gen_range(0..n);
    let mut b = rng.gen_range(0..n - 1);
    if b >= a {
        b += 1;
    }
    (a, b)
}

/// Samples two hosts and keeps the one with fewer in-flight requests.
#[derive(Debug, Default)]
pub struct P2c;

impl P2c {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for P2c {
    const NAME: &'static str = P2C;

    fn select(&self, hosts: &[Arc<HostEntity>], _key: &str) -> usize {
        if hosts.len() == 1 {
            return 0;
        }
        let (a, b) = draw_pair(&mut rand::thread_rng(), hosts.len());
        if hosts[a].inflight() > hosts[b].inflight() {
            b
        } else {
            a
        }
    }
}
