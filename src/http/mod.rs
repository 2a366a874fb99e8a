//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (query/JSON → FragmentDirective, cookies, tracer)
//!     → resolver (one task per fragment)
//!     → server.rs (HTML or JSON page, X-Cache, Cache-Control, status)
//! ```

pub mod request;
pub mod server;

pub use request::{ApiError, DirectiveParams, RequestContext, X_TRACER};
pub use server::{AppState, ComposeRequest, GatewayServer, ServerError, X_CACHE};
