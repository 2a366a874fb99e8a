//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Build the fragment resolver from configuration
//! - Bind server to listener and stop on shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::cache::MemoryCache;
use crate::config::GatewayConfig;
use crate::fetch::{Fetch, HttpFetcher};
use crate::http::request::{ApiError, DirectiveParams, RequestContext};
use crate::observability::{metrics, DebugRecorder};
use crate::resilience::CircuitBreaker;
use crate::resolver::{resolve_page, ErrorHandler, FragmentResolver, PageResult, PolicyErrorHandler};

pub const X_CACHE: &str = "x-cache";

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<FragmentResolver>,
    pub handler: Arc<dyn ErrorHandler>,
    pub cache: MemoryCache,
    pub debug: Arc<DebugRecorder>,
    pub config: Arc<GatewayConfig>,
}

/// HTTP front door for fragment resolution.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    /// Server fetching over a pooled HTTP client built from `config.fetch`.
    pub fn new(config: GatewayConfig) -> Self {
        let fetcher = Arc::new(HttpFetcher::from_config(&config.fetch));
        Self::with_fetcher(config, fetcher)
    }

    /// Server using `fetcher` for every backend call.
    pub fn with_fetcher(config: GatewayConfig, fetcher: Arc<dyn Fetch>) -> Self {
        let cache = MemoryCache::new(config.cache.max_entries);
        let debug = Arc::new(DebugRecorder::new(config.debug.enabled));
        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));

        let resolver = FragmentResolver::new(Arc::new(cache.clone()), breaker, fetcher)
            .with_debug(debug.clone())
            .with_cache_enabled(config.cache.enabled);

        let state = AppState {
            resolver: Arc::new(resolver),
            handler: Arc::new(PolicyErrorHandler),
            cache,
            debug,
            config: Arc::new(config),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);

        let mut router = Router::new()
            .route("/fragment", get(fragment_handler))
            .route("/compose", post(compose_handler));
        if state.config.admin.enabled {
            router = router.merge(admin::routes(state.clone()));
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(request_timeout)),
        )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `signal` fires.
    ///
    /// Take the receiver from `Shutdown::subscribe` before spawning the server.
    pub async fn run(
        self,
        listener: TcpListener,
        mut signal: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = signal.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `GET /fragment`: resolve one fragment and return it as HTML.
async fn fragment_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DirectiveParams>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let start = Instant::now();
    let context = RequestContext::from_request(&headers, &query, &state.config.cookies.whitelist);
    let directive = match params.into_directive(&context, &state.config) {
        Ok(directive) => directive,
        Err(e) => return reject("fragment", e, start),
    };

    tracing::debug!(
        tracer = %context.tracer,
        url = %directive.url,
        cache_key = %directive.cache_key,
        "Resolving fragment"
    );

    let page = resolve_page(state.resolver.clone(), vec![directive], state.handler.clone()).await;
    let status = StatusCode::from_u16(page.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    metrics::record_request("fragment", status.as_u16(), start);

    let mut response = page_headers(&page, status);
    let Some(fragment) = page.fragments.into_iter().next() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no fragment resolved").into_response();
    };
    response.extend([
        (header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8")),
        (
            header::HeaderName::from_static(X_CACHE),
            HeaderValue::from_static(fragment.cache.as_str()),
        ),
    ]);
    (status, response, fragment.content).into_response()
}

/// Body of `POST /compose`.
#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    pub fragments: Vec<DirectiveParams>,
}

/// `POST /compose`: resolve several fragments concurrently as one page.
async fn compose_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    Json(request): Json<ComposeRequest>,
) -> Response {
    let start = Instant::now();
    let context = RequestContext::from_request(&headers, &query, &state.config.cookies.whitelist);

    let directives = match request
        .fragments
        .into_iter()
        .map(|params| params.into_directive(&context, &state.config))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(directives) => directives,
        Err(e) => return reject("compose", e, start),
    };

    tracing::debug!(tracer = %context.tracer, fragments = directives.len(), "Composing page");

    let page = resolve_page(state.resolver.clone(), directives, state.handler.clone()).await;
    let status = StatusCode::from_u16(page.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    metrics::record_request("compose", status.as_u16(), start);

    (status, page_headers(&page, status), Json(page)).into_response()
}

fn page_headers(page: &PageResult, status: StatusCode) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(cache_control) = page.cache_control {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
    }
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "Page carries a failed fragment's status");
    }
    headers
}

fn reject(endpoint: &'static str, error: ApiError, start: Instant) -> Response {
    tracing::warn!(endpoint, error = %error, "Rejected request");
    metrics::record_request(endpoint, StatusCode::BAD_REQUEST.as_u16(), start);
    error.into_response()
}
