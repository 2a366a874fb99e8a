use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::observability::TraceAnnotation;
use crate::resilience::{CircuitSnapshot, CircuitState};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub cache: CacheSummary,
    pub open_circuits: usize,
}

#[derive(Serialize)]
pub struct CacheSummary {
    pub enabled: bool,
    pub fresh: usize,
    pub expired: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let (fresh, expired) = state.cache.summary();
    let open_circuits = state
        .resolver
        .breaker()
        .snapshot()
        .iter()
        .filter(|c| c.state != CircuitState::Closed)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        cache: CacheSummary {
            enabled: state.config.cache.enabled,
            fresh,
            expired,
        },
        open_circuits,
    })
}

pub async fn get_circuits(State(state): State<AppState>) -> Json<Vec<CircuitSnapshot>> {
    Json(state.resolver.breaker().snapshot())
}

#[derive(Debug, Deserialize)]
pub struct DebugQuery {
    pub url: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum DebugResponse {
    Entries {
        url: String,
        annotations: Vec<TraceAnnotation>,
    },
    Urls {
        enabled: bool,
        urls: Vec<String>,
    },
}

/// Annotations for `?url=`, or every traced URL without one.
pub async fn get_debug(
    State(state): State<AppState>,
    Query(query): Query<DebugQuery>,
) -> Json<DebugResponse> {
    match query.url {
        Some(url) => {
            let annotations = state.debug.entries(&url);
            Json(DebugResponse::Entries { url, annotations })
        }
        None => Json(DebugResponse::Urls {
            enabled: state.debug.is_enabled(),
            urls: state.debug.urls(),
        }),
    }
}
