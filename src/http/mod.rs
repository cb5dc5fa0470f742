//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → routing layer picks the route
//!     → admission policy of the route
//!     → balancer picks the backend
//!     → hyper client forwards
//!     → response.rs (body streamed back, holding the request's lease)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
