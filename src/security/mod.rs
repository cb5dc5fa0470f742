//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (route matched, client IP resolved):
//!     → access_control.rs (static IP blacklist)
//!     → limits.rs (wait for a concurrency slot)
//!     → rate_limit.rs (token bucket: allow or reject)
//!     → leaky_bucket.rs (queue, released one per tick)
//!     → Dispatch to the load balancer
//! ```
//!
//! # Design Decisions
//! - Fixed order; each stage is optional per route
//! - Rejections are values, not errors to retry
//! - Status-code mapping lives on `Rejection` so the HTTP layer stays thin

use std::future::Future;
use std::net::{AddrParseError, IpAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::sync::{oneshot, OwnedSemaphorePermit};

use crate::config::AdmissionConfig;

pub mod access_control;
pub mod headers;
pub mod leaky_bucket;
pub mod limits;
pub mod rate_limit;

pub use access_control::IpBlacklist;
pub use leaky_bucket::LeakyBucket;
pub use limits::AdmissionGate;
pub use rate_limit::TokenBucket;

/// Why a request was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Forbidden")]
    Blacklisted,

    #[error("Too Many Requests")]
    NoTokens,

    #[error("Too Many Requests")]
    QueueFull,

    /// The concurrency gate was shut down.
    #[error("Service Unavailable")]
    GateClosed,

    /// A queued request was dropped before it ran.
    #[error("Service Unavailable")]
    Dropped,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Blacklisted => StatusCode::FORBIDDEN,
            Rejection::NoTokens | Rejection::QueueFull => StatusCode::TOO_MANY_REQUESTS,
            Rejection::GateClosed | Rejection::Dropped => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Blacklisted => "blacklisted",
            Rejection::NoTokens => "no_tokens",
            Rejection::QueueFull => "queue_full",
            Rejection::GateClosed => "gate_closed",
            Rejection::Dropped => "dropped",
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Proof that a request passed admission.
///
/// Holds the route's concurrency slot, when the route has one, until it is
/// dropped. The HTTP layer keeps it alive until the response body ends.
#[derive(Debug, Default)]
pub struct AdmissionTicket {
    _slot: Option<OwnedSemaphorePermit>,
}

/// The admission pipeline of one route.
#[derive(Debug, Clone, Default)]
pub struct AdmissionPolicy {
    blacklist: Option<IpBlacklist>,
    gate: Option<AdmissionGate>,
    token_bucket: Option<Arc<TokenBucket>>,
    leaky_bucket: Option<LeakyBucket>,
}

impl AdmissionPolicy {
    /// A policy that admits everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from route configuration. Zero or empty knobs leave the stage
    /// disabled. Spawns the leaky bucket drainer, so it must run inside a
    /// Tokio runtime when that stage is enabled.
    pub fn from_config(config: &AdmissionConfig) -> Result<Self, AddrParseError> {
        let mut policy = Self::new();

        if !config.ip_blacklist.is_empty() {
            policy = policy.with_blacklist(IpBlacklist::parse(&config.ip_blacklist)?);
        }
        if config.max_allowed > 0 {
            policy = policy.with_gate(AdmissionGate::new(config.max_allowed));
        }
        let tb = &config.token_bucket;
        if tb.enabled && tb.capacity > 0 {
            policy = policy.with_token_bucket(TokenBucket::new(tb.capacity, tb.rate));
        }
        let lb = &config.leaky_bucket;
        if lb.enabled && lb.capacity > 0 && lb.interval_ms > 0 {
            policy = policy.with_leaky_bucket(LeakyBucket::start(
                lb.capacity,
                Duration::from_millis(lb.interval_ms),
            ));
        }

        Ok(policy)
    }

    pub fn with_blacklist(mut self, blacklist: IpBlacklist) -> Self {
        self.blacklist = Some(blacklist);
        self
    }

    pub fn with_gate(mut self, gate: AdmissionGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_token_bucket(mut self, bucket: TokenBucket) -> Self {
        self.token_bucket = Some(Arc::new(bucket));
        self
    }

    pub fn with_leaky_bucket(mut self, bucket: LeakyBucket) -> Self {
        self.leaky_bucket = Some(bucket);
        self
    }

    /// True when no stage is configured.
    pub fn is_passthrough(&self) -> bool {
        self.blacklist.is_none()
            && self.gate.is_none()
            && self.token_bucket.is_none()
            && self.leaky_bucket.is_none()
    }

    /// Human-readable list of active stages, for startup logging.
    pub fn describe(&self) -> String {
        let mut stages = Vec::new();
        if let Some(bl) = &self.blacklist {
            stages.push(format!("blacklist({})", bl.len()));
        }
        if let Some(gate) = &self.gate {
            stages.push(format!("max_allowed({})", gate.capacity()));
        }
        if let Some(tb) = &self.token_bucket {
            stages.push(format!("token_bucket({}@{}/s)", tb.capacity(), tb.rate()));
        }
        if let Some(lb) = &self.leaky_bucket {
            stages.push(format!("leaky_bucket({}@{:?})", lb.capacity(), lb.interval()));
        }
        if stages.is_empty() {
            return "none".to_string();
        }
        stages.join(", ")
    }

    /// Run `dispatch` if the client at `ip` is admitted.
    ///
    /// `dispatch` receives the [`AdmissionTicket`]; the concurrency slot is
    /// held for as long as the ticket lives, including time spent in the
    /// leaky bucket. A queued request whose caller has gone away is skipped
    /// at its tick and `dispatch` never runs.
    pub async fn run<F, Fut, T>(&self, ip: IpAddr, dispatch: F) -> Result<T, Rejection>
    where
        F: FnOnce(AdmissionTicket) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if let Some(blacklist) = &self.blacklist {
            if blacklist.is_blocked(ip) {
                return Err(Rejection::Blacklisted);
            }
        }

        let ticket = AdmissionTicket {
            _slot: match &self.gate {
                Some(gate) => Some(gate.acquire().await?),
                None => None,
            },
        };

        if let Some(bucket) = &self.token_bucket {
            if !bucket.allow() {
                return Err(Rejection::NoTokens);
            }
        }

        match &self.leaky_bucket {
            Some(bucket) => {
                let (mut tx, rx) = oneshot::channel();
                bucket.submit(async move {
                    if tx.is_closed() {
                        return;
                    }
                    let output = tokio::select! {
                        output = dispatch(ticket) => output,
                        _ = tx.closed() => return,
                    };
                    let _ = tx.send(output);
                })?;
                rx.await.map_err(|_| Rejection::Dropped)
            }
            None => Ok(dispatch(ticket).await),
        }
    }
}
