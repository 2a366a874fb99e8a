//! HTTP fetcher backed by a pooled hyper client.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use futures_util::StreamExt;
use hyper::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::FetchConfig;
use crate::fetch::{Fetch, FetchOutcome};
use crate::fragment::FragmentError;

const ACCEPT_FRAGMENTS: &str = "text/html,application/xhtml+xml,application/xml,application/json";

/// Shared connection pool used for every fragment fetch.
pub type HttpClient = Client<HttpConnector, Body>;

/// Build the connection pool described by `config`.
pub fn build_client(config: &FetchConfig) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build(connector)
}

/// Fetches fragments over HTTP.
#[derive(Clone)]
pub struct HttpFetcher {
    client: HttpClient,
    user_agent: HeaderValue,
}

impl HttpFetcher {
    /// Fetcher over an existing pool.
    pub fn new(client: HttpClient, user_agent: &str) -> Self {
        let user_agent = HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("Compoxure-Request-Agent"));
        Self { client, user_agent }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(build_client(config), &config.user_agent)
    }

    async fn send(&self, url: &str, request: Request<Body>) -> FetchOutcome {
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| FragmentError::transport(url, root_cause(&e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FragmentError::status(url, status.as_u16()));
        }

        let mut body = Body::new(response.into_body()).into_data_stream();
        let mut content = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| FragmentError::transport(url, root_cause(&e)))?;
            content.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&content).into_owned())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, mut headers: HeaderMap, timeout: Duration) -> FetchOutcome {
        let Some(uri) = parse_target(url) else {
            return Err(FragmentError::invalid_url(url));
        };

        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_FRAGMENTS));
        headers.insert(USER_AGENT, self.user_agent.clone());

        let mut request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .map_err(|_| FragmentError::invalid_url(url))?;
        *request.headers_mut() = headers;

        match tokio::time::timeout(timeout, self.send(url, request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FragmentError::transport(
                url,
                format_args!("timeout after {}ms", timeout.as_millis()),
            )),
        }
    }
}

/// A request URI for `url`, or `None` when it has no usable scheme.
pub fn parse_target(url: &str) -> Option<Uri> {
    let parsed = Url::parse(url).ok()?;
    if !parsed.has_host() {
        return None;
    }
    parsed.as_str().parse().ok()
}

/// The innermost error in a source chain, which carries the useful phrase.
fn root_cause(err: &(dyn StdError + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
