//! Operator endpoints.
//!
//! # Data Flow
//! ```text
//! GET /admin/*
//!     → auth.rs (bearer token, when one is configured)
//!     → handlers.rs (status, circuits, debug trace)
//! ```

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use crate::http::server::AppState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/circuits", get(get_circuits))
        .route("/admin/debug", get(get_debug))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
