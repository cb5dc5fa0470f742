//! tiny-balancer: a reverse-proxy load balancer with pluggable balancing
//! strategies and per-route admission control.

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;

// Traffic management
pub mod load_balancer;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Balancer, BalancerError, StrategyRegistry};
