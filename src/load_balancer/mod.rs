//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → route's Balancer identified
//!     → pool.rs (host set under RwLock)
//!     → Apply selection rule:
//!         - ip_hash.rs (stable hash of the client key)
//!         - random.rs (uniform draw)
//!         - round_robin.rs (rotate through hosts)
//!         - least_load.rs (fewest in-flight requests)
//!         - p2c.rs (best of two random draws by in-flight)
//!         - p2c_ewma.rs (best of two by decayed latency × in-flight)
//!     → guard.rs (inc on dispatch, done + latency on drop)
//!     → Return host name or NoHostAvailable
//! ```
//!
//! # Design Decisions
//! - One strategy instance per route; routes share nothing
//! - Selection rules are plain `Selector`s; `HostPool` owns the locking
//! - Strategies are built from an explicit `StrategyRegistry`, never a global
//! - Unknown hosts in `inc`/`done`/completions are silent no-ops, since a
//!   `remove` can race an in-flight request

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod guard;
pub mod host;
pub mod ip_hash;
pub mod least_load;
pub mod p2c;
pub mod p2c_ewma;
pub mod pool;
pub mod random;
pub mod registry;
pub mod round_robin;

pub use guard::InflightGuard;
pub use host::{HostEntity, HostSet};
pub use pool::HostPool;
pub use registry::StrategyRegistry;

pub const IP_HASH: &str = "ip-hash";
pub const RANDOM: &str = "random";
pub const ROUND_ROBIN: &str = "round-robin";
pub const LEAST_LOAD: &str = "least-load";
pub const P2C: &str = "p2c";
pub const P2C_EWMA: &str = "p2c-ewma";

/// Errors surfaced by the balancing subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalancerError {
    /// `balance` was called on an empty host set.
    #[error("no host available")]
    NoHostAvailable,

    /// The configured strategy name is not registered.
    #[error("unknown balancing strategy: {0}")]
    UnknownStrategy(String),
}

/// Completion callback returned by [`Balancer::request_ctx`].
///
/// Invoked exactly once with the host the request went to.
pub type Completion = Box<dyn FnOnce(&str) + Send + 'static>;

/// The contract every balancing strategy satisfies.
pub trait Balancer: Send + Sync + fmt::Debug {
    /// Strategy identifier, e.g. `"p2c-ewma"`.
    fn strategy(&self) -> &'static str;

    /// Add a host. No-op if already present.
    fn add(&self, host: &str);

    /// Remove a host. No-op if absent.
    fn remove(&self, host: &str);

    /// Select a host for the given routing key.
    fn balance(&self, key: &str) -> Result<String, BalancerError>;

    /// A request to `host` started.
    fn inc(&self, host: &str);

    /// A request to `host` finished.
    fn done(&self, host: &str);

    /// Capture the dispatch start time. The returned callback records the
    /// observed latency for latency-aware strategies and does nothing for
    /// the rest.
    fn request_ctx(&self) -> Completion;

    /// Current host names in insertion order.
    fn hosts(&self) -> Vec<String>;
}

/// A selection rule plugged into a [`HostPool`].
pub trait Selector: Send + Sync + fmt::Debug + 'static {
    /// Strategy identifier used for registration and logging.
    const NAME: &'static str;

    /// Whether completions should be fed to [`Selector::observe`].
    const TRACKS_LATENCY: bool = false;

    /// Pick an index into `hosts`. `hosts` is never empty.
    fn select(&self, hosts: &[Arc<HostEntity>], key: &str) -> usize;

    /// Record a completed request that started at `start` and finished at
    /// `now` (pool-relative nanoseconds). Runs under the pool's write lock.
    fn observe(&self, _host: &HostEntity, _start: u64, _now: u64) {}
}
