//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (route lookup: host, then path prefix)
//!     → Return: matched Route (balancer + admission policy) or NoMatch
//!
//! Route Compilation (at startup):
//!     RouteConfig[] + StrategyRegistry
//!     → Build balancer and admission policy per route
//!     → Sort by priority, then prefix length
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins

pub mod router;

pub use router::{Route, RouteError, Router};
