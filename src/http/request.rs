//! Inbound request to fragment directive.
//!
//! # Responsibilities
//! - Read directive parameters from a query string or JSON body
//! - Carry the tracer id, whitelisted cookies and template variables
//! - Reject malformed parameters with a 400
//!
//! # Design Decisions
//! - The tracer id comes from `x-tracer` or is generated, and is forwarded to backends
//! - Template variables come from `x-<name>|<variable>` query parameters only

use std::collections::BTreeMap;

use axum::{
    http::{
        header::{HeaderName, COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::config::{parse_duration, GatewayConfig};
use crate::fragment::context::{outbound_cookie_header, render_url_template, template_variables};
use crate::fragment::{ErrorPolicy, FragmentDirective};

pub const X_TRACER: HeaderName = HeaderName::from_static("x-tracer");

/// Parameters describing one fragment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectiveParams {
    pub id: Option<String>,
    /// Target URL, possibly containing `{{name:variable}}` tokens.
    pub url: Option<String>,
    pub key: Option<String>,
    /// Duration string; bare numbers are milliseconds.
    pub ttl: Option<String>,
    pub timeout: Option<String>,
    pub no_cache: bool,
    pub policy: Option<String>,
    #[serde(rename = "type")]
    pub fragment_type: Option<String>,
    /// Placeholder content kept by the `leave-original` policy.
    pub original: Option<String>,
}

/// Rejections for malformed directive parameters.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing url parameter")]
    MissingUrl,

    #[error("invalid {field} '{value}'")]
    InvalidDuration { field: &'static str, value: String },

    #[error("{0}")]
    InvalidPolicy(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// What every directive of one inbound request shares.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tracer: String,
    pub cookie: Option<HeaderValue>,
    pub variables: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn from_request(headers: &HeaderMap, query: &[(String, String)], whitelist: &[String]) -> Self {
        let tracer = headers
            .get(&X_TRACER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let cookie = headers
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|raw| outbound_cookie_header(raw, whitelist))
            .filter(|filtered| !filtered.is_empty())
            .and_then(|filtered| HeaderValue::from_str(&filtered).ok());

        let variables = template_variables(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        Self {
            tracer,
            cookie,
            variables,
        }
    }
}

impl DirectiveParams {
    /// Build the directive, rendering the URL template against `context`.
    pub fn into_directive(
        self,
        context: &RequestContext,
        config: &GatewayConfig,
    ) -> Result<FragmentDirective, ApiError> {
        let template = self.url.filter(|u| !u.is_empty()).ok_or(ApiError::MissingUrl)?;
        let url = render_url_template(&template, &context.variables);

        let mut directive = FragmentDirective::new(url)
            .with_unparsed_url(template)
            .with_timeout(config.fetch.default_timeout())
            .with_tracer(context.tracer.clone());

        if let Some(id) = self.id {
            directive = directive.with_id(id);
        }
        if let Some(key) = self.key {
            directive = directive.with_cache_key(key);
        }
        if let Some(ttl) = self.ttl {
            directive = directive.with_ttl(duration("ttl", ttl)?);
        }
        if let Some(timeout) = self.timeout {
            directive = directive.with_timeout(duration("timeout", timeout)?);
        }
        if self.no_cache {
            directive = directive.no_cache();
        }
        if let Some(policy) = self.policy {
            let policy: ErrorPolicy = policy.parse().map_err(ApiError::InvalidPolicy)?;
            directive = directive.with_policy(policy);
        }
        if let Some(fragment_type) = self.fragment_type {
            directive = directive.with_type(fragment_type);
        }
        if let Some(original) = self.original {
            directive = directive.with_original_content(original);
        }

        if let Ok(tracer) = HeaderValue::from_str(&context.tracer) {
            directive = directive.with_header(X_TRACER, tracer);
        }
        if let Some(cookie) = &context.cookie {
            directive = directive.with_header(COOKIE, cookie.clone());
        }

        Ok(directive)
    }
}

fn duration(field: &'static str, value: String) -> Result<std::time::Duration, ApiError> {
    parse_duration(&value).ok_or(ApiError::InvalidDuration { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn context(headers: &HeaderMap, query: &[(&str, &str)], whitelist: &[&str]) -> RequestContext {
        let query: Vec<_> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let whitelist: Vec<_> = whitelist.iter().map(|w| w.to_string()).collect();
        RequestContext::from_request(headers, &query, &whitelist)
    }

    #[test]
    fn test_tracer_forwarded_or_generated() {
        let mut headers = HeaderMap::new();
        headers.insert(X_TRACER, HeaderValue::from_static("abc-123"));
        assert_eq!(context(&headers, &[], &[]).tracer, "abc-123");

        let generated = context(&HeaderMap::new(), &[], &[]).tracer;
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn test_cookies_filtered_by_whitelist() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("CompoxureCookie=Test; AnotherCookie=Test; TSLCookie=Test"),
        );
        let ctx = context(&headers, &[], &["CompoxureCookie", "TSLCookie"]);
        assert_eq!(ctx.cookie.unwrap(), "CompoxureCookie=Test; TSLCookie=Test");

        let ctx = context(&headers, &[], &["Nope"]);
        assert!(ctx.cookie.is_none());
    }

    #[test]
    fn test_directive_from_params() {
        let ctx = context(&HeaderMap::new(), &[("x-user|id", "42")], &[]);
        let params = DirectiveParams {
            id: Some("basket".into()),
            url: Some("http://svc/basket/{{user:id}}".into()),
            ttl: Some("30s".into()),
            timeout: Some("250".into()),
            policy: Some("fail-loud".into()),
            ..Default::default()
        };

        let directive = params.into_directive(&ctx, &GatewayConfig::default()).unwrap();
        assert_eq!(directive.id, "basket");
        assert_eq!(directive.url, "http://svc/basket/42");
        assert_eq!(directive.unparsed_url, "http://svc/basket/{{user:id}}");
        assert_eq!(directive.cache_ttl, 30);
        assert_eq!(directive.timeout, Duration::from_millis(250));
        assert_eq!(directive.error_policy, ErrorPolicy::FailLoud);
        assert_eq!(directive.headers.get(&X_TRACER).unwrap(), ctx.tracer.as_str());
    }

    #[test]
    fn test_rejects_bad_params() {
        let ctx = context(&HeaderMap::new(), &[], &[]);
        let config = GatewayConfig::default();

        let missing = DirectiveParams::default().into_directive(&ctx, &config);
        assert!(matches!(missing, Err(ApiError::MissingUrl)));

        let bad_ttl = DirectiveParams {
            url: Some("http://svc/a".into()),
            ttl: Some("soon".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad_ttl.into_directive(&ctx, &config),
            Err(ApiError::InvalidDuration { field: "ttl", .. })
        ));

        let bad_policy = DirectiveParams {
            url: Some("http://svc/a".into()),
            policy: Some("shout".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad_policy.into_directive(&ctx, &config),
            Err(ApiError::InvalidPolicy(_))
        ));
    }
}
