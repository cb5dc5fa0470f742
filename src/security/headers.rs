//! Forwarding headers.
//!
//! # Responsibilities
//! - Extract the client IP used for blacklisting and ip-hash affinity
//! - Append the observed peer to X-Forwarded-For on the upstream request
//!
//! # Design Decisions
//! - Client IP resolution order: first X-Forwarded-For entry, X-Real-IP,
//!   then the socket peer
//! - Unparsable header values fall through to the next source

use axum::http::{HeaderMap, HeaderValue};
use std::net::IpAddr;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Resolve the client address for a request received from `peer`.
pub fn client_ip(headers: &HeaderMap, peer: IpAddr) -> IpAddr {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    forwarded.or_else(real_ip).unwrap_or(peer).to_canonical()
}

/// Append `peer` to the X-Forwarded-For chain.
pub fn append_forwarded_for(headers: &mut HeaderMap, peer: IpAddr) {
    let peer = peer.to_canonical().to_string();
    let chain = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{}, {}", existing, peer),
        _ => peer,
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
