//! The fully-resolved instruction to fetch one fragment.

use std::str::FromStr;
use std::time::Duration;

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::fragment::keys::{cache_key, metric_key};

/// URL meaning "serve from cache only, never contact an origin".
pub const CACHE_ONLY_URL: &str = "cache";

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// What the composition layer does when a fragment cannot be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Render the failure message and propagate its status to the page.
    #[serde(rename = "fail-loud")]
    FailLoud,
    /// Render nothing.
    #[default]
    #[serde(rename = "fail-quiet")]
    FailQuiet,
    /// Keep the placeholder's original content.
    #[serde(rename = "leave-original")]
    LeaveOriginal,
    /// Render nothing on 404, otherwise behave like `FailQuiet`.
    #[serde(rename = "ignore-404")]
    Ignore404,
    /// Render nothing, whatever went wrong.
    #[serde(rename = "ignore-error")]
    IgnoreError,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailLoud => "fail-loud",
            Self::FailQuiet => "fail-quiet",
            Self::LeaveOriginal => "leave-original",
            Self::Ignore404 => "ignore-404",
            Self::IgnoreError => "ignore-error",
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-loud" | "loud" => Ok(Self::FailLoud),
            "fail-quiet" | "quiet" => Ok(Self::FailQuiet),
            "leave-original" | "leave" => Ok(Self::LeaveOriginal),
            "ignore-404" => Ok(Self::Ignore404),
            "ignore-error" | "ignore" => Ok(Self::IgnoreError),
            other => Err(format!("unknown error policy '{}'", other)),
        }
    }
}

/// One fragment to resolve.
///
/// Built once by the composition layer and consumed by a single pipeline
/// run. `headers` is this directive's own copy; the fetcher adds `Accept`
/// and `User-Agent` to it at send time.
#[derive(Debug, Clone)]
pub struct FragmentDirective {
    /// Placeholder identifier, used to pair results with slots.
    pub id: String,
    /// Target URL after template substitution.
    pub url: String,
    /// URL as written in the template; key for debug annotations.
    pub unparsed_url: String,
    pub cache_key: String,
    /// Seconds; zero disables caching.
    pub cache_ttl: u64,
    pub explicit_no_cache: bool,
    pub timeout: Duration,
    pub headers: HeaderMap,
    pub error_policy: ErrorPolicy,
    pub tracer: String,
    /// Fragment type tag for telemetry (`pc_type` in logs).
    pub fragment_type: String,
    /// Prefix for every metric this fragment emits.
    pub statsd_key: String,
    /// Placeholder content kept by `ErrorPolicy::LeaveOriginal`.
    pub original_content: String,
}

impl FragmentDirective {
    /// Directive for `url` with keys derived from it and caching disabled.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let key = cache_key(&url);
        Self {
            id: key.clone(),
            unparsed_url: url.clone(),
            statsd_key: metric_key(&key),
            cache_key: key,
            url,
            cache_ttl: 0,
            explicit_no_cache: false,
            timeout: DEFAULT_TIMEOUT,
            headers: HeaderMap::new(),
            error_policy: ErrorPolicy::default(),
            tracer: String::new(),
            fragment_type: "fragment".to_string(),
            original_content: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Keep `unparsed_url` as the template the URL was rendered from.
    pub fn with_unparsed_url(mut self, template: impl Into<String>) -> Self {
        self.unparsed_url = template.into();
        self
    }

    /// Use an explicit cache key; the metric key follows it.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = key.into();
        self.statsd_key = metric_key(&self.cache_key);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl.as_secs();
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.explicit_no_cache = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_tracer(mut self, tracer: impl Into<String>) -> Self {
        self.tracer = tracer.into();
        self
    }

    pub fn with_type(mut self, fragment_type: impl Into<String>) -> Self {
        self.fragment_type = fragment_type.into();
        self
    }

    pub fn with_original_content(mut self, content: impl Into<String>) -> Self {
        self.original_content = content.into();
        self
    }

    pub fn cache_enabled(&self) -> bool {
        !self.explicit_no_cache && self.cache_ttl > 0
    }

    pub fn is_cache_only(&self) -> bool {
        self.url == CACHE_ONLY_URL
    }

    /// Options snapshot recorded when resolution starts.
    pub fn snapshot(&self) -> serde_json::Value {
        let headers: serde_json::Map<String, serde_json::Value> = self
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned().into(),
                )
            })
            .collect();

        serde_json::json!({
            "id": self.id,
            "url": self.url,
            "unparsedUrl": self.unparsed_url,
            "cacheKey": self.cache_key,
            "cacheTTL": self.cache_ttl,
            "explicitNoCache": self.explicit_no_cache,
            "timeout": self.timeout.as_millis() as u64,
            "headers": headers,
            "errorPolicy": self.error_policy.as_str(),
            "tracer": self.tracer,
            "type": self.fragment_type,
            "statsdKey": self.statsd_key,
        })
    }
}
