//! Page-level join point: resolve every directive of a page concurrently.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::CacheStatus;
use crate::fragment::FragmentDirective;
use crate::resolver::pipeline::{FragmentResolver, Resolution};
use crate::resolver::policy::ErrorHandler;
use crate::resolver::sink;

/// One placeholder's outcome.
#[derive(Debug, Clone, Serialize)]
pub struct FragmentResult {
    pub id: String,
    pub content: String,
    pub cache: CacheStatus,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// All fragments of a page, in directive order, plus the page's HTTP semantics.
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub fragments: Vec<FragmentResult>,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<&'static str>,
}

impl PageResult {
    pub fn fragment(&self, id: &str) -> Option<&FragmentResult> {
        self.fragments.iter().find(|f| f.id == id)
    }
}

/// Resolve `directives` with one task each and wait for all of them.
///
/// A fragment's failure never cancels its siblings. The page status is the
/// first status propagated by an error handler, in directive order, else 200.
pub async fn resolve_page(
    resolver: Arc<FragmentResolver>,
    directives: Vec<FragmentDirective>,
    handler: Arc<dyn ErrorHandler>,
) -> PageResult {
    let no_store = directives.iter().any(|d| d.explicit_no_cache);

    let tasks: Vec<_> = directives
        .into_iter()
        .map(|directive| {
            let resolver = resolver.clone();
            let handler = handler.clone();
            let id = directive.id.clone();
            let task = tokio::spawn(async move {
                let (sink, rx) = sink::channel();
                let resolution = resolver.resolve(&directive, sink, handler.as_ref()).await;
                (rx.await.unwrap_or_default(), resolution)
            });
            (id, task)
        })
        .collect();

    let mut fragments = Vec::with_capacity(tasks.len());
    let mut status = None;
    for (id, task) in tasks {
        match task.await {
            Ok((content, resolution)) => {
                status = status.or(resolution.propagated_status);
                fragments.push(fragment_result(id, content, resolution));
            }
            Err(e) => {
                tracing::error!(fragment = %id, error = %e, "Fragment task failed");
                fragments.push(FragmentResult {
                    id,
                    content: String::new(),
                    cache: CacheStatus::Disabled,
                    elapsed_ms: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    PageResult {
        fragments,
        status: status.unwrap_or(200),
        cache_control: no_store.then_some("no-store"),
    }
}

fn fragment_result(id: String, content: String, resolution: Resolution) -> FragmentResult {
    FragmentResult {
        id,
        content,
        cache: resolution.cache,
        elapsed_ms: resolution.elapsed.as_millis() as u64,
        error: resolution.failure.map(|f| f.message().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::cache::MemoryCache;
    use crate::config::CircuitBreakerConfig;
    use crate::fetch::MockFetcher;
    use crate::fragment::{ErrorPolicy, FragmentError};
    use crate::resilience::CircuitBreaker;
    use crate::resolver::policy::PolicyErrorHandler;

    fn resolver(fetcher: &MockFetcher) -> Arc<FragmentResolver> {
        Arc::new(FragmentResolver::new(
            Arc::new(MemoryCache::new(100)),
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
            Arc::new(fetcher.clone()),
        ))
    }

    #[tokio::test]
    async fn test_fragments_keep_directive_order() {
        let fetcher = MockFetcher::new();
        fetcher
            .respond("http://svc/header", "<header/>")
            .respond("http://svc/footer", "<footer/>");

        let page = resolve_page(
            resolver(&fetcher),
            vec![
                FragmentDirective::new("http://svc/header").with_id("header"),
                FragmentDirective::new("http://svc/footer")
                    .with_id("footer")
                    .with_ttl(Duration::from_secs(30)),
            ],
            Arc::new(PolicyErrorHandler),
        )
        .await;

        assert_eq!(page.status, 200);
        assert_eq!(page.cache_control, None);
        let ids: Vec<_> = page.fragments.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["header", "footer"]);
        assert_eq!(page.fragment("footer").unwrap().content, "<footer/>");
        assert_eq!(page.fragment("footer").unwrap().cache, CacheStatus::Miss);
    }

    #[tokio::test]
    async fn test_loud_failure_sets_page_status_without_touching_siblings() {
        let fetcher = MockFetcher::new();
        fetcher
            .respond("http://svc/header", "<header/>")
            .fail("http://svc/basket", FragmentError::status("http://svc/basket", 503));

        let page = resolve_page(
            resolver(&fetcher),
            vec![
                FragmentDirective::new("http://svc/header").with_id("header"),
                FragmentDirective::new("http://svc/basket")
                    .with_id("basket")
                    .with_policy(ErrorPolicy::FailLoud),
                FragmentDirective::new("http://svc/missing")
                    .with_id("missing")
                    .with_policy(ErrorPolicy::Ignore404),
            ],
            Arc::new(PolicyErrorHandler),
        )
        .await;

        assert_eq!(page.status, 503);
        assert_eq!(page.fragment("header").unwrap().content, "<header/>");
        assert!(page.fragment("basket").unwrap().content.contains("status code 503"));
        let missing = page.fragment("missing").unwrap();
        assert_eq!(missing.content, "");
        assert!(missing.error.is_some());
    }

    #[tokio::test]
    async fn test_missing_fragment_makes_page_not_found() {
        let fetcher = MockFetcher::new();

        let page = resolve_page(
            resolver(&fetcher),
            vec![FragmentDirective::new("http://svc/missing").with_id("missing")],
            Arc::new(PolicyErrorHandler),
        )
        .await;
        assert_eq!(page.status, 404);
        assert_eq!(page.fragment("missing").unwrap().content, "");

        let page = resolve_page(
            resolver(&fetcher),
            vec![FragmentDirective::new("http://svc/missing")
                .with_id("missing")
                .with_policy(ErrorPolicy::Ignore404)],
            Arc::new(PolicyErrorHandler),
        )
        .await;
        assert_eq!(page.status, 200);
    }

    #[tokio::test]
    async fn test_no_cache_directive_marks_page_no_store() {
        let fetcher = MockFetcher::new();
        fetcher.respond("http://svc/user", "<p>hi</p>");

        let page = resolve_page(
            resolver(&fetcher),
            vec![FragmentDirective::new("http://svc/user").no_cache()],
            Arc::new(PolicyErrorHandler),
        )
        .await;
        assert_eq!(page.cache_control, Some("no-store"));
    }
}
