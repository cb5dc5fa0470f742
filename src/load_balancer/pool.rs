//! Host pool management.
//!
//! # Responsibilities
//! - Own the host set of one route behind a single `RwLock`
//! - Apply the selection rule to pick a host
//! - Route `inc`/`done`/completion events to the right host

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use crate::load_balancer::{Balancer, BalancerError, Completion, HostSet, Selector};

/// A host group driven by a selection rule.
///
/// `add`/`remove` take the write lock so `balance` never observes a
/// half-updated set. `inc`/`done` only need the read lock since the
/// counters are atomic. Latency completions take the write lock so two
/// completions on the same host cannot lose an update.
#[derive(Debug)]
pub struct HostPool<S> {
    shared: Arc<Shared<S>>,
}

#[derive(Debug)]
struct Shared<S> {
    hosts: RwLock<HostSet>,
    selector: S,
    epoch: Instant,
}

impl<S: Selector> HostPool<S> {
    /// Create a pool seeded with `hosts`. Duplicates are ignored.
    pub fn new(selector: S, hosts: &[String]) -> Self {
        let mut set = HostSet::new();
        for host in hosts {
            set.insert(host);
        }
        Self {
            shared: Arc::new(Shared {
                hosts: RwLock::new(set),
                selector,
                epoch: Instant::now(),
            }),
        }
    }

    /// Access the selection rule.
    pub fn selector(&self) -> &S {
        &self.shared.selector
    }

    /// Run `f` against the host set under the read lock.
    pub fn with_hosts<R>(&self, f: impl FnOnce(&HostSet) -> R) -> R {
        f(&self.shared.read())
    }

    /// Record a completion with explicit pool-relative timestamps.
    #[cfg(test)]
    pub(crate) fn complete_at(&self, host: &str, start: u64, now: u64) {
        let set = self.shared.write();
        if let Some(entity) = set.get(host) {
            self.shared.selector.observe(entity, start, now);
        }
    }
}

impl<S> Shared<S> {
    fn read(&self) -> RwLockReadGuard<'_, HostSet> {
        self.hosts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HostSet> {
        self.hosts.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Nanoseconds since the pool was created.
    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

impl<S: Selector> Shared<S> {
    fn complete(&self, host: &str, start: u64) {
        let set = self.write();
        let Some(entity) = set.get(host) else {
            return;
        };
        let now = self.now();
        self.selector.observe(entity, start, now);
    }
}

impl<S: Selector> Balancer for HostPool<S> {
    fn strategy(&self) -> &'static str {
        S::NAME
    }

    fn add(&self, host: &str) {
        if self.shared.write().insert(host) {
            tracing::debug!(strategy = S::NAME, host = %host, "Host added");
        }
    }

    fn remove(&self, host: &str) {
        if self.shared.write().remove(host) {
            tracing::debug!(strategy = S::NAME, host = %host, "Host removed");
        }
    }

    fn balance(&self, key: &str) -> Result<String, BalancerError> {
        let set = self.shared.read();
        let hosts = set.as_slice();
        if hosts.is_empty() {
            return Err(BalancerError::NoHostAvailable);
        }
        let index = self.shared.selector.select(hosts, key);
        Ok(hosts[index].name().to_string())
    }

    fn inc(&self, host: &str) {
        if let Some(entity) = self.shared.read().get(host) {
            entity.inc();
        }
    }

    fn done(&self, host: &str) {
        if let Some(entity) = self.shared.read().get(host) {
            entity.done();
        }
    }

    fn request_ctx(&self) -> Completion {
        if !S::TRACKS_LATENCY {
            return Box::new(|_: &str| {});
        }
        let shared = self.shared.clone();
        let start = shared.now();
        Box::new(move |host: &str| shared.complete(host, start))
    }

    fn hosts(&self) -> Vec<String> {
        self.shared
            .read()
            .as_slice()
            .iter()
            .map(|h| h.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::round_robin::RoundRobin;

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_pool_has_no_host() {
        let pool = HostPool::new(RoundRobin::new(), &[]);
        assert_eq!(pool.balance("k"), Err(BalancerError::NoHostAvailable));
    }

    #[test]
    fn test_balance_tracks_add_and_remove() {
        let pool = HostPool::new(RoundRobin::new(), &hosts(&["a", "b"]));

        pool.remove("a");
        for _ in 0..4 {
            assert_eq!(pool.balance("k").unwrap(), "b");
        }

        pool.remove("b");
        assert_eq!(pool.balance("k"), Err(BalancerError::NoHostAvailable));

        pool.add("c");
        pool.add("c");
        assert_eq!(pool.hosts(), vec!["c".to_string()]);
        assert_eq!(pool.balance("k").unwrap(), "c");
    }

    #[test]
    fn test_duplicate_seed_hosts_are_ignored() {
        let pool = HostPool::new(RoundRobin::new(), &hosts(&["a", "a", "b"]));
        assert_eq!(pool.hosts(), hosts(&["a", "b"]));
    }

    #[test]
    fn test_inc_done_on_unknown_host_is_noop() {
        let pool = HostPool::new(RoundRobin::new(), &hosts(&["a"]));
        pool.inc("missing");
        pool.done("missing");
        (pool.request_ctx())("missing");
        assert_eq!(pool.with_hosts(|set| set.get("a").unwrap().inflight()), 0);
    }

    #[test]
    fn test_inc_done_counts() {
        let pool = HostPool::new(RoundRobin::new(), &hosts(&["a"]));
        for _ in 0..7 {
            pool.inc("a");
        }
        for _ in 0..4 {
            pool.done("a");
        }
        assert_eq!(pool.with_hosts(|set| set.get("a").unwrap().inflight()), 3);
    }

    #[test]
    fn test_concurrent_inc_done_is_not_lost() {
        let pool = Arc::new(HostPool::new(RoundRobin::new(), &hosts(&["a", "b"])));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    pool.inc("a");
                    let _ = pool.balance("k");
                    pool.done("a");
                    pool.inc("a");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.with_hosts(|set| set.get("a").unwrap().inflight()), 8000);
    }

    #[test]
    fn test_balance_never_returns_removed_host_under_churn() {
        let pool = Arc::new(HostPool::new(RoundRobin::new(), &hosts(&["stable"])));
        let writer = {
            let pool = pool.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    let name = format!("tmp-{}", i);
                    pool.add(&name);
                    pool.remove(&name);
                }
            })
        };
        for _ in 0..2000 {
            let host = pool.balance("k").unwrap();
            assert!(host == "stable" || host.starts_with("tmp-"));
        }
        writer.join().unwrap();
        assert_eq!(pool.hosts(), hosts(&["stable"]));
    }
}
