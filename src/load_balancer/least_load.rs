//! Least load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{host::HostEntity, Selector, LEAST_LOAD};

/// Least load selector.
/// Selects the host with the fewest in-flight requests.
#[derive(Debug, Default)]
pub struct LeastLoad;

impl LeastLoad {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for LeastLoad {
    const NAME: &'static str = LEAST_LOAD;

    fn select(&self, hosts: &[Arc<HostEntity>], _key: &str) -> usize {
        // In case of tie, the first one is selected (stability)
        hosts
            .iter()
            .enumerate()
            .min_by_key(|(_, h)| h.inflight())
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{Balancer, HostPool};

    #[test]
    fn test_least_load() {
        let lb = HostPool::new(
            LeastLoad::new(),
            &["127.0.0.1:8080".to_string(), "127.0.0.1:8081".to_string()],
        );

        // artificially increase load on the first host
        lb.inc("127.0.0.1:8080");

        // Should pick the second (0 in flight)
        assert_eq!(lb.balance("").unwrap(), "127.0.0.1:8081");

        lb.inc("127.0.0.1:8081");
        lb.inc("127.0.0.1:8081"); // now second has 2, first has 1

        assert_eq!(lb.balance("").unwrap(), "127.0.0.1:8080");
    }

    #[test]
    fn test_least_load_tie_picks_first() {
        let lb = HostPool::new(
            LeastLoad::new(),
            &["a".to_string(), "b".to_string(), "c".to_string()],
        );
        assert_eq!(lb.balance("").unwrap(), "a");

        lb.inc("a");
        assert_eq!(lb.balance("").unwrap(), "b");

        lb.done("a");
        assert_eq!(lb.balance("").unwrap(), "a");
    }
}
