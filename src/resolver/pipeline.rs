//! Per-fragment resolution.
//!
//! # Data Flow
//! ```text
//! FragmentDirective
//!     → debug: options snapshot
//!     → caching disabled? ──────────────────────────────┐
//!     → FragmentCache::get                               │
//!         ├─ fresh hit  → sink.end(content), done        │
//!         ├─ read error → error handler(failure, stale)  │
//!         └─ miss/expired (stale kept)                   │
//!             └─ URL "cache" → sink.end(""), done        │
//!     → CircuitBreaker::call(identity, Fetch::fetch) ◄───┘
//!         ├─ Ok(body)  → sink.end(body) → FragmentCache::set
//!         └─ Err(e)    → error handler(e, stale) → sink.end(substitute)
//! ```
//!
//! # Design Decisions
//! - Timing starts at pipeline entry, so hits report near-zero latency
//! - Every path ends the sink once and records one terminal debug annotation
//! - Cache writes happen after the sink is ended; their failures are logged only
//! - Malformed URLs fail before the breaker and never count against a backend

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use crate::cache::{CacheLookup, CacheStatus, FragmentCache};
use crate::fetch::Fetch;
use crate::fragment::{FragmentDirective, FragmentError};
use crate::observability::{
    DebugRecorder, DebugTrace, MetricsStats, StatsEmitter, TraceAnnotation, TraceStatus,
};
use crate::resilience::CircuitBreaker;
use crate::resolver::policy::ErrorHandler;
use crate::resolver::sink::OutputSink;

/// How one fragment resolution ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub cache: CacheStatus,
    /// Time from pipeline entry to the sink being ended.
    pub elapsed: Duration,
    /// Set when the fragment failed and was substituted.
    pub failure: Option<FragmentError>,
    /// Page status requested by the error handler's substitution.
    pub propagated_status: Option<u16>,
}

impl Resolution {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Turns directives into content using the cache, breaker and fetcher.
pub struct FragmentResolver {
    cache: Arc<dyn FragmentCache>,
    breaker: Arc<CircuitBreaker>,
    fetcher: Arc<dyn Fetch>,
    stats: Arc<dyn StatsEmitter>,
    debug: Arc<dyn DebugTrace>,
    cache_enabled: bool,
}

impl FragmentResolver {
    /// Resolver emitting to the global metrics recorder with debug tracing off.
    pub fn new(
        cache: Arc<dyn FragmentCache>,
        breaker: Arc<CircuitBreaker>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            cache,
            breaker,
            fetcher,
            stats: Arc::new(MetricsStats),
            debug: Arc::new(DebugRecorder::new(false)),
            cache_enabled: true,
        }
    }

    pub fn with_stats(mut self, stats: Arc<dyn StatsEmitter>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_debug(mut self, debug: Arc<dyn DebugTrace>) -> Self {
        self.debug = debug;
        self
    }

    /// Turn the cache off for every directive, whatever its TTL.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Resolve `directive`, ending `sink` exactly once.
    pub async fn resolve<S: OutputSink>(
        &self,
        directive: &FragmentDirective,
        sink: S,
        handler: &dyn ErrorHandler,
    ) -> Resolution {
        let start = Instant::now();
        self.debug.add(
            &directive.unparsed_url,
            TraceAnnotation::Options {
                options: directive.snapshot(),
            },
        );

        if !(self.cache_enabled && directive.cache_enabled()) {
            self.stats.increment(&format!("{}.cacheDisabled", directive.statsd_key));
            return self
                .fetch_and_end(directive, sink, handler, start, CacheStatus::Disabled, None)
                .await;
        }

        let stale = match self.cache.get(&directive.cache_key).await {
            Ok(CacheLookup {
                content: Some(content),
                ..
            }) => return self.end_with_hit(directive, sink, start, content),
            Ok(lookup) => lookup.stale,
            Err(e) => {
                tracing::warn!(
                    tracer = %directive.tracer,
                    pc_type = %directive.fragment_type,
                    cache_key = %directive.cache_key,
                    error = %e,
                    "Cache read failed"
                );
                let failure = FragmentError::cache(&e);
                let stale = e.into_stale();
                return self.end_with_failure(directive, sink, handler, start, CacheStatus::Miss, failure, stale);
            }
        };

        self.stats.increment(&format!("{}.cacheMiss", directive.statsd_key));
        tracing::debug!(
            tracer = %directive.tracer,
            pc_type = %directive.fragment_type,
            cache_key = %directive.cache_key,
            stale = stale.is_some(),
            "Cache miss"
        );
        self.debug.add(
            &directive.unparsed_url,
            TraceAnnotation::Cache {
                cache: CacheStatus::Miss,
            },
        );

        if directive.is_cache_only() {
            sink.end(String::new());
            let elapsed = start.elapsed();
            self.record_ok(directive, None, elapsed);
            return Resolution {
                cache: CacheStatus::Miss,
                elapsed,
                failure: None,
                propagated_status: None,
            };
        }

        self.fetch_and_end(directive, sink, handler, start, CacheStatus::Miss, stale)
            .await
    }

    async fn fetch_and_end<S: OutputSink>(
        &self,
        directive: &FragmentDirective,
        sink: S,
        handler: &dyn ErrorHandler,
        start: Instant,
        cache: CacheStatus,
        stale: Option<String>,
    ) -> Resolution {
        let content = match self.fetch(directive).await {
            Ok(content) => content,
            Err(failure) => {
                return self.end_with_failure(directive, sink, handler, start, cache, failure, stale);
            }
        };

        sink.end(content.clone());
        let elapsed = start.elapsed();
        self.stats
            .timing(&format!("{}.responseTime", directive.statsd_key), elapsed);
        tracing::debug!(
            tracer = %directive.tracer,
            pc_type = %directive.fragment_type,
            url = %directive.url,
            response_time_ms = elapsed.as_millis() as u64,
            "Fragment fetched"
        );
        self.record_ok(
            directive,
            (cache == CacheStatus::Disabled).then_some(CacheStatus::Disabled),
            elapsed,
        );

        if cache == CacheStatus::Miss {
            let ttl = Duration::from_secs(directive.cache_ttl);
            if let Err(e) = self.cache.set(&directive.cache_key, &content, ttl).await {
                tracing::warn!(
                    tracer = %directive.tracer,
                    cache_key = %directive.cache_key,
                    error = %e,
                    "Cache write failed"
                );
            }
        }

        Resolution {
            cache,
            elapsed,
            failure: None,
            propagated_status: None,
        }
    }

    async fn fetch(&self, directive: &FragmentDirective) -> Result<String, FragmentError> {
        let target = match Url::parse(&directive.url) {
            Ok(target) if target.has_host() => target,
            _ => return Err(FragmentError::invalid_url(&directive.url)),
        };
        let identity = self.breaker.identity_for(&target);

        self.breaker
            .call(&identity, &directive.url, || {
                self.fetcher
                    .fetch(&directive.url, directive.headers.clone(), directive.timeout)
            })
            .await
    }

    fn end_with_hit<S: OutputSink>(
        &self,
        directive: &FragmentDirective,
        sink: S,
        start: Instant,
        content: String,
    ) -> Resolution {
        sink.end(content);
        let elapsed = start.elapsed();
        self.stats.increment(&format!("{}.cacheHit", directive.statsd_key));
        self.stats
            .timing(&format!("{}.cacheHit.responseTime", directive.statsd_key), elapsed);
        tracing::debug!(
            tracer = %directive.tracer,
            pc_type = %directive.fragment_type,
            cache_key = %directive.cache_key,
            response_time_ms = elapsed.as_millis() as u64,
            "Cache hit"
        );
        self.record_ok(directive, Some(CacheStatus::Hit), elapsed);

        Resolution {
            cache: CacheStatus::Hit,
            elapsed,
            failure: None,
            propagated_status: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn end_with_failure<S: OutputSink>(
        &self,
        directive: &FragmentDirective,
        sink: S,
        handler: &dyn ErrorHandler,
        start: Instant,
        cache: CacheStatus,
        failure: FragmentError,
        stale: Option<String>,
    ) -> Resolution {
        tracing::error!(
            tracer = %directive.tracer,
            pc_type = %directive.fragment_type,
            status_code = ?failure.status_code(),
            has_stale = stale.is_some(),
            "{}",
            failure
        );

        let substitution = handler.on_error(directive, &failure, stale);
        let propagated_status = substitution.as_ref().and_then(|s| s.status);
        sink.end(substitution.map(|s| s.content).unwrap_or_default());

        let elapsed = start.elapsed();
        self.stats.increment(&format!("{}.failure", directive.statsd_key));
        self.stats
            .timing(&format!("{}.failure.responseTime", directive.statsd_key), elapsed);
        self.debug.add(
            &directive.unparsed_url,
            TraceAnnotation::Status {
                status: TraceStatus::Error,
                cache: None,
                timing: elapsed.as_millis() as u64,
                error: Some(failure.message().to_string()),
            },
        );

        Resolution {
            cache,
            elapsed,
            failure: Some(failure),
            propagated_status,
        }
    }

    fn record_ok(&self, directive: &FragmentDirective, cache: Option<CacheStatus>, elapsed: Duration) {
        self.debug.add(
            &directive.unparsed_url,
            TraceAnnotation::Status {
                status: TraceStatus::Ok,
                cache,
                timing: elapsed.as_millis() as u64,
                error: None,
            },
        );
    }
}
