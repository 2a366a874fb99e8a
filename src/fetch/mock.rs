//! Scripted fetcher for tests and local composition without backends.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hyper::header::HeaderMap;

use crate::fetch::{Fetch, FetchOutcome};
use crate::fragment::FragmentError;

/// One observed fetch.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub url: String,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

/// Fetcher returning scripted outcomes per URL.
///
/// Outcomes queued for a URL are consumed in order; once a URL's queue is
/// empty its last outcome repeats. Unknown URLs fail with status 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, VecDeque<FetchOutcome>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    call_count: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful body for `url`.
    pub fn respond(&self, url: &str, body: &str) -> &Self {
        self.push(url, Ok(body.to_string()))
    }

    /// Queue a failure for `url`.
    pub fn fail(&self, url: &str, error: FragmentError) -> &Self {
        self.push(url, Err(error))
    }

    fn push(&self, url: &str, outcome: FetchOutcome) -> &Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.entry(url.to_string()).or_default().push_back(outcome);
        }
        self
    }

    /// Total fetches performed.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_outcome(&self, url: &str) -> FetchOutcome {
        let Ok(mut responses) = self.responses.lock() else {
            return Err(FragmentError::transport(url, "mock poisoned"));
        };
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(FragmentError::status(url, 404))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FragmentError::status(url, 404))),
            None => Err(FragmentError::status(url, 404)),
        }
    }
}

#[async_trait]
impl Fetch for MockFetcher {
    async fn fetch(&self, url: &str, headers: HeaderMap, timeout: Duration) -> FetchOutcome {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                url: url.to_string(),
                headers,
                timeout,
            });
        }
        self.next_outcome(url)
    }
}
