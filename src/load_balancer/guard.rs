//! Dispatch bookkeeping for a single request.

use std::fmt;
use std::sync::Arc;

use crate::load_balancer::{Balancer, BalancerError, Completion};

/// A RAII guard pairing `inc` with `done`.
///
/// Created once a host has been chosen; dropping it calls `done` and fires
/// the latency completion. Dropping also happens when the request future is
/// cancelled, so aborted requests never leave `inflight` raised.
pub struct InflightGuard {
    balancer: Arc<dyn Balancer>,
    host: String,
    completion: Option<Completion>,
}

impl InflightGuard {
    /// Select a host for `key` and mark a request as dispatched to it.
    pub fn acquire(balancer: Arc<dyn Balancer>, key: &str) -> Result<Self, BalancerError> {
        let host = balancer.balance(key)?;
        let completion = balancer.request_ctx();
        balancer.inc(&host);
        Ok(Self {
            balancer,
            host,
            completion: Some(completion),
        })
    }

    /// The chosen host.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Debug for InflightGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InflightGuard")
            .field("strategy", &self.balancer.strategy())
            .field("host", &self.host)
            .finish()
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.balancer.done(&self.host);
        if let Some(completion) = self.completion.take() {
            completion(self.host.as_str());
        }
    }
}
