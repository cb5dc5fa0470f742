//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every route names a registered strategy
//! - Validate backend URLs, blacklist entries and policy knobs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::IpAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, RouteConfig};
use crate::load_balancer::StrategyRegistry;
use crate::security::AdmissionGate;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no routes configured")]
    NoRoutes,

    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("route '{route}': path_prefix '{prefix}' must start with '/'")]
    InvalidPathPrefix { route: String, prefix: String },

    #[error("route '{route}': unknown balance_mode '{mode}'")]
    UnknownBalanceMode { route: String, mode: String },

    #[error("route '{0}': no backends")]
    NoBackends(String),

    #[error("route '{route}': invalid backend '{backend}': {reason}")]
    InvalidBackend {
        route: String,
        backend: String,
        reason: String,
    },

    #[error("route '{route}': invalid blacklist entry '{entry}'")]
    InvalidBlacklistEntry { route: String, entry: String },

    #[error("route '{route}': {field} must be greater than zero")]
    ZeroValue { route: String, field: &'static str },

    #[error("route '{route}': {field} must not exceed {max}")]
    TooLarge {
        route: String,
        field: &'static str,
        max: usize,
    },

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,
}

/// Validate `config` against the strategies in `registry`.
pub fn validate_config(
    config: &ProxyConfig,
    registry: &StrategyRegistry,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let mut names = HashSet::new();
    for route in &config.routes {
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        validate_route(route, registry, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, registry: &StrategyRegistry, errors: &mut Vec<ValidationError>) {
    let name = || route.name.clone();

    if !route.path_prefix.starts_with('/') {
        errors.push(ValidationError::InvalidPathPrefix {
            route: name(),
            prefix: route.path_prefix.clone(),
        });
    }

    if !registry.contains(&route.balance_mode) {
        errors.push(ValidationError::UnknownBalanceMode {
            route: name(),
            mode: route.balance_mode.clone(),
        });
    }

    if route.backends.is_empty() {
        errors.push(ValidationError::NoBackends(name()));
    }
    for backend in &route.backends {
        if let Err(reason) = check_backend(backend) {
            errors.push(ValidationError::InvalidBackend {
                route: name(),
                backend: backend.clone(),
                reason,
            });
        }
    }

    let admission = &route.admission;
    for entry in &admission.ip_blacklist {
        if entry.trim().parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidBlacklistEntry {
                route: name(),
                entry: entry.clone(),
            });
        }
    }

    if admission.max_allowed > AdmissionGate::MAX_CAPACITY {
        errors.push(ValidationError::TooLarge {
            route: name(),
            field: "max_allowed",
            max: AdmissionGate::MAX_CAPACITY,
        });
    }

    let tb = &admission.token_bucket;
    if tb.enabled {
        if tb.capacity == 0 {
            errors.push(ValidationError::ZeroValue { route: name(), field: "token_bucket.capacity" });
        }
        if tb.rate == 0 {
            errors.push(ValidationError::ZeroValue { route: name(), field: "token_bucket.rate" });
        }
    }

    let lb = &admission.leaky_bucket;
    if lb.enabled {
        if lb.capacity == 0 {
            errors.push(ValidationError::ZeroValue { route: name(), field: "leaky_bucket.capacity" });
        }
        if lb.interval_ms == 0 {
            errors.push(ValidationError::ZeroValue { route: name(), field: "leaky_bucket.interval_ms" });
        }
    }
}

fn check_backend(backend: &str) -> Result<(), String> {
    let url = Url::parse(backend).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
