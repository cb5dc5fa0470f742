//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (timeout, request ID, tracing)
//! - Dispatch requests to the routing engine
//! - Run each route's admission policy, then its balancer
//! - Forward requests to the selected upstream backend

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::ProxyConfig;
use crate::http::request::{request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::response::{hold_until_complete, RequestLease};
use crate::load_balancer::{InflightGuard, StrategyRegistry};
use crate::observability::metrics::{self, InflightGauge};
use crate::routing::{Route, RouteError, Router as ProxyRouter};
use crate::security::{headers, AdmissionTicket};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    routes: Arc<ProxyRouter>,
    config: ProxyConfig,
}

impl HttpServer {
    /// Compile routes and build the handler stack.
    ///
    /// Must be called inside a Tokio runtime: leaky-bucket drainers are
    /// spawned here.
    pub fn new(config: ProxyConfig, registry: &StrategyRegistry) -> Result<Self, RouteError> {
        let routes = Arc::new(ProxyRouter::from_config(&config.routes, registry)?);

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            router: routes.clone(),
            client,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            routes,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id(request),
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.routes.routes().len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The compiled route table.
    pub fn routes(&self) -> &ProxyRouter {
        &self.routes
    }
}

/// Main proxy handler.
/// Looks up route, runs admission, selects backend, and forwards request.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();

    let Some(route) = state.router.match_request(&request) else {
        tracing::warn!(path = %request.uri().path(), "No route matched");
        metrics::record_request("none", 404, start_time);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };

    let client_ip = headers::client_ip(request.headers(), peer.ip());
    let dispatch = {
        let client = state.client.clone();
        let route = route.clone();
        move |ticket| forward(client, route, request, client_ip, peer.ip(), ticket)
    };

    let response = match route.admission.run(client_ip, dispatch).await {
        Ok(response) => response,
        Err(rejection) => {
            tracing::info!(
                route = %route.name,
                client = %client_ip,
                reason = rejection.reason(),
                "Request rejected"
            );
            metrics::record_rejected(&route.name, rejection.reason());
            rejection.into_response()
        }
    };

    metrics::record_request(&route.name, response.status().as_u16(), start_time);
    response
}

/// Pick a backend for `route` and relay the request to it.
///
/// The returned body owns the balancer guard and the admission ticket, so
/// the request stays in flight until the body is fully sent.
async fn forward(
    client: Client<HttpConnector, Body>,
    route: Arc<Route>,
    request: Request<Body>,
    client_ip: IpAddr,
    peer: IpAddr,
    ticket: AdmissionTicket,
) -> Response {
    let guard = match InflightGuard::acquire(route.balancer.clone(), &client_ip.to_string()) {
        Ok(guard) => guard,
        Err(e) => {
            tracing::warn!(route = %route.name, error = %e, "No backend available");
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };
    let backend = guard.host().to_string();
    metrics::record_backend_selected(&route.name, &backend);
    let gauge = InflightGauge::new(&route.name, &backend);

    let (mut parts, body) = request.into_parts();
    let Some(uri) = upstream_uri(&backend, &parts.uri) else {
        tracing::error!(route = %route.name, backend = %backend, "Invalid backend address");
        return (StatusCode::BAD_GATEWAY, "Invalid backend address").into_response();
    };

    tracing::debug!(
        route = %route.name,
        strategy = route.balancer.strategy(),
        backend = %backend,
        client = %client_ip,
        "Forwarding request"
    );

    parts.uri = uri;
    parts.headers.remove(header::HOST);
    headers::append_forwarded_for(&mut parts.headers, peer);

    match client.request(Request::from_parts(parts, body)).await {
        Ok(response) => hold_until_complete(
            response,
            RequestLease {
                guard,
                gauge,
                ticket,
            },
        ),
        Err(e) => {
            tracing::error!(route = %route.name, backend = %backend, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Rebase the incoming path and query onto the backend URL.
fn upstream_uri(backend: &str, incoming: &Uri) -> Option<Uri> {
    let base = Url::parse(backend).ok()?;
    let host = base.host_str()?;
    let authority = match base.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let prefix = base.path().trim_end_matches('/');
    let path_and_query = incoming
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Uri::builder()
        .scheme(base.scheme())
        .authority(authority)
        .path_and_query(format!("{}{}", prefix, path_and_query))
        .build()
        .ok()
}
