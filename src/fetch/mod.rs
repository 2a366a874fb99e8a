//! Fragment fetching.
//!
//! # Data Flow
//! ```text
//! FragmentDirective (url, headers, timeout)
//!     → client.rs (validate URL, inject Accept/User-Agent, GET)
//!     → stream body into a buffer
//!     → FetchOutcome: Ok(body) | Err(FragmentError)
//! ```
//!
//! # Design Decisions
//! - The connection pool is built once and injected, never global
//! - Only a 200 is a success; any other status is a failure carrying it
//! - The timeout covers connect, headers and body together

pub mod client;
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use hyper::header::HeaderMap;

use crate::fragment::FragmentError;

pub use client::HttpFetcher;
pub use mock::MockFetcher;

/// Result of one fetch attempt.
pub type FetchOutcome = Result<String, FragmentError>;

/// Performs a single fragment GET.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` with `headers`, giving up after `timeout`.
    async fn fetch(&self, url: &str, headers: HeaderMap, timeout: Duration) -> FetchOutcome;
}
