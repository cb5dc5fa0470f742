//! Strategy registry.
//!
//! # Responsibilities
//! - Map strategy names to constructors
//! - Build a strategy instance from a backend host list
//!
//! # Design Decisions
//! - Built explicitly at startup and passed by reference to the route
//!   builder; there is no process-wide mutable table
//! - Read-only once routes are built

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::load_balancer::{
    ip_hash::IpHash, least_load::LeastLoad, p2c::P2c, p2c_ewma::P2cEwma, random::Random,
    round_robin::RoundRobin, Balancer, BalancerError, HostPool, Selector,
};

/// Constructor for a strategy instance.
pub type Factory = fn(&[String]) -> Arc<dyn Balancer>;

fn pool_factory<S: Selector + Default>(hosts: &[String]) -> Arc<dyn Balancer> {
    Arc::new(HostPool::new(S::default(), hosts))
}

/// Name → constructor table.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: HashMap<&'static str, Factory>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding all six built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_selector::<IpHash>();
        registry.register_selector::<Random>();
        registry.register_selector::<RoundRobin>();
        registry.register_selector::<LeastLoad>();
        registry.register_selector::<P2c>();
        registry.register_selector::<P2cEwma>();
        registry
    }

    /// Register a constructor under `name`, replacing any previous one.
    pub fn register(&mut self, name: &'static str, factory: Factory) {
        self.factories.insert(name, factory);
    }

    /// Register a `HostPool` driven by selector `S` under `S::NAME`.
    pub fn register_selector<S: Selector + Default>(&mut self) {
        self.register(S::NAME, pool_factory::<S>);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Build the strategy `name` over `hosts`.
    pub fn build(&self, name: &str, hosts: &[String]) -> Result<Arc<dyn Balancer>, BalancerError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BalancerError::UnknownStrategy(name.to_string()))?;
        Ok(factory(hosts))
    }
}
