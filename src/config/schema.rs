//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions mapping requests to backend groups.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A route: which requests it takes, how it balances, what it admits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match, case-insensitive).
    #[serde(default)]
    pub host: Option<String>,

    /// Path prefix to match.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// Balancing strategy name (e.g. "round-robin", "p2c-ewma").
    #[serde(default = "default_balance_mode")]
    pub balance_mode: String,

    /// Backend base URLs (e.g. "http://127.0.0.1:3000").
    pub backends: Vec<String>,

    /// Admission control for this route.
    #[serde(default)]
    pub admission: AdmissionConfig,
}

fn default_path_prefix() -> String {
    "/".to_string()
}

fn default_balance_mode() -> String {
    crate::load_balancer::ROUND_ROBIN.to_string()
}

/// Admission control knobs. Zero/empty/disabled means the stage is off.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum concurrently admitted requests (0 = unlimited).
    pub max_allowed: usize,

    /// Client addresses that are always refused.
    pub ip_blacklist: Vec<String>,

    /// Token bucket rate limiting.
    pub token_bucket: TokenBucketConfig,

    /// Leaky bucket shaping.
    pub leaky_bucket: LeakyBucketConfig,
}

/// Token bucket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenBucketConfig {
    pub enabled: bool,

    /// Burst capacity (max tokens).
    pub capacity: u64,

    /// Refill rate in tokens per second.
    pub rate: u64,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 100,
            rate: 50,
        }
    }
}

/// Leaky bucket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LeakyBucketConfig {
    pub enabled: bool,

    /// Maximum queued requests.
    pub capacity: usize,

    /// Drain interval in milliseconds (one request per interval).
    pub interval_ms: u64,
}

impl Default for LeakyBucketConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 100,
            interval_ms: 10,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
