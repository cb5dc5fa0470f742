//! Power of two random choices weighted by decayed latency.
//!
//! Each host keeps an exponentially-weighted moving average of observed
//! request latency. Two hosts are drawn at random and scored as
//! `floor(sqrt(lag + 1)) * (inflight + 1)`; the lower score wins and the
//! first-drawn host wins ties.
//!
//! The weight given to history decays with the time since the host's
//! previous completion: `w = exp(-elapsed / DECAY_TIME)`. A host that has
//! been quiet for a while is re-estimated mostly from its next sample.

use std::sync::Arc;
use std::time::Duration;

use crate::load_balancer::{host::HostEntity, p2c::draw_pair, Selector, P2C_EWMA};

/// Score returned for a host whose product comes out as zero.
pub const PENALTY: u64 = 1_000_000;

/// Time constant of the latency decay.
pub const DECAY_TIME: Duration = Duration::from_secs(10);

/// The p2c-ewma selector.
#[derive(Debug, Default)]
pub struct P2cEwma;

impl P2cEwma {
    pub fn new() -> Self {
        Self
    }
}

/// Load score of a host. Lower is better.
pub fn load(host: &HostEntity) -> u64 {
    let lag = (host.lag().saturating_add(1) as f64).sqrt() as u64;
    let inflight = host.inflight().max(0) as u64;
    let load = lag.saturating_mul(inflight + 1);
    if load == 0 {
        return PENALTY;
    }
    load
}

/// The lower-scored of `a` and `b`; `a` on a tie.
fn pick(hosts: &[Arc<HostEntity>], a: usize, b: usize) -> usize {
    if load(&hosts[a]) > load(&hosts[b]) {
        b
    } else {
        a
    }
}

impl Selector for P2cEwma {
    const NAME: &'static str = P2C_EWMA;
    const TRACKS_LATENCY: bool = true;

    fn select(&self, hosts: &[Arc<HostEntity>], _key: &str) -> usize {
        if hosts.len() == 1 {
            return 0;
        }
        let (a, b) = draw_pair(&mut rand::thread_rng(), hosts.len());
        pick(hosts, a, b)
    }

    fn observe(&self, host: &HostEntity, start: u64, now: u64) {
        let last = host.swap_last(now);
        let elapsed = now.saturating_sub(last);
        let mut w = (-(elapsed as f64) / DECAY_TIME.as_nanos() as f64).exp();

        let sample = now.saturating_sub(start);
        let old = host.lag();
        // No history yet: take the first sample as is.
        if old == 0 {
            w = 0.0;
        }

        let lag = old as f64 * w + sample as f64 * (1.0 - w);
        host.store_lag(lag as u64);
        tracing::trace!(host = %host.name(), sample, lag = lag as u64, weight = w, "Latency recorded");
    }
}
