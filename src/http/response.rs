//! Upstream response relaying.
//!
//! # Responsibilities
//! - Stream the backend's body to the client without buffering
//! - Keep the request's in-flight accounting alive until that body ends
//!
//! # Design Decisions
//! - A request counts as finished when its response body is done or
//!   dropped, not when the headers arrive. Balancer `done`, the latency
//!   completion, the in-flight gauge and the admission slot all release
//!   together at that point.

use axum::body::Body;
use axum::http::Response;
use http_body_util::BodyExt;

use crate::load_balancer::InflightGuard;
use crate::observability::metrics::InflightGauge;
use crate::security::AdmissionTicket;

/// Everything a request holds while it is in flight.
#[derive(Debug)]
pub struct RequestLease {
    pub guard: InflightGuard,
    pub gauge: InflightGauge,
    pub ticket: AdmissionTicket,
}

/// Re-box `response` so its body owns `lease` until the body finishes.
pub fn hold_until_complete<B>(response: Response<B>, lease: RequestLease) -> Response<Body>
where
    B: axum::body::HttpBody<Data = axum::body::Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let (parts, body) = response.into_parts();
    let body = body.map_frame(move |frame| {
        let _lease = &lease;
        frame
    });
    Response::from_parts(parts, Body::new(body))
}
