//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Compile each route config into a balancer, an admission policy and
//!   its match conditions (optional host, path prefix)
//! - Find the route for a request, or report that none applies
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Ordered by priority, then by longest path prefix
//! - Host comparison ignores ASCII case and any port; prefixes are
//!   compared byte for byte

use std::net::AddrParseError;
use std::sync::Arc;

use axum::http::{header, Request};
use thiserror::Error;

use crate::config::RouteConfig;
use crate::load_balancer::{Balancer, BalancerError, StrategyRegistry};
use crate::security::AdmissionPolicy;

/// Errors raised while compiling routes.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route '{route}': {source}")]
    Strategy { route: String, source: BalancerError },

    #[error("route '{route}': invalid blacklist entry: {source}")]
    Blacklist { route: String, source: AddrParseError },
}

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub priority: u32,
    pub path_prefix: String,
    /// Lowercased host the request must target, if any.
    pub host: Option<String>,
    /// The route's own balancing strategy instance.
    pub balancer: Arc<dyn Balancer>,
    /// The route's admission pipeline.
    pub admission: AdmissionPolicy,
}

impl Route {
    /// Compile one route. Must run inside a Tokio runtime when the route
    /// enables a leaky bucket.
    pub fn from_config(config: &RouteConfig, registry: &StrategyRegistry) -> Result<Self, RouteError> {
        let balancer = registry
            .build(&config.balance_mode, &config.backends)
            .map_err(|source| RouteError::Strategy {
                route: config.name.clone(),
                source,
            })?;
        let admission = AdmissionPolicy::from_config(&config.admission).map_err(|source| {
            RouteError::Blacklist {
                route: config.name.clone(),
                source,
            }
        })?;

        Ok(Self {
            name: config.name.clone(),
            priority: config.priority,
            path_prefix: config.path_prefix.clone(),
            host: config.host.as_ref().map(|h| h.to_ascii_lowercase()),
            balancer,
            admission,
        })
    }

    /// Path prefix and, when set, host both have to agree.
    pub fn matches<B>(&self, req: &Request<B>) -> bool {
        if !req.uri().path().starts_with(&self.path_prefix) {
            return false;
        }
        match &self.host {
            Some(want) => request_host(req).is_some_and(|got| got.eq_ignore_ascii_case(want)),
            None => true,
        }
    }
}

/// Host the request targets, without the port.
fn request_host<B>(req: &Request<B>) -> Option<&str> {
    let authority = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))?;

    if let Some(end) = authority.find(']') {
        return Some(&authority[..=end]);
    }
    Some(match authority.split_once(':') {
        Some((host, _)) => host,
        None => authority,
    })
}

/// The route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Arc<Route>>,
}

impl Router {
    /// Compile all routes.
    pub fn from_config(configs: &[RouteConfig], registry: &StrategyRegistry) -> Result<Self, RouteError> {
        let mut routes = configs
            .iter()
            .map(|c| Route::from_config(c, registry).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.path_prefix.len().cmp(&a.path_prefix.len()))
        });

        Ok(Self { routes })
    }

    /// First matching route, if any.
    pub fn match_request<B>(&self, req: &Request<B>) -> Option<Arc<Route>> {
        self.routes.iter().find(|r| r.matches(req)).cloned()
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }
}
