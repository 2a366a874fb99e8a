//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the fragment gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Outbound fragment fetch settings.
    pub fetch: FetchConfig,

    /// Fragment cache settings.
    pub cache: CacheConfig,

    /// Per-backend circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Cookie forwarding rules.
    pub cookies: CookieConfig,

    /// Timeouts for the inbound HTTP surface.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Debug trace recording.
    pub debug: DebugConfig,

    /// Admin endpoints.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Outbound fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout applied when a directive does not carry its own, in milliseconds.
    pub default_timeout_ms: u64,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// User-Agent sent to every backend.
    pub user_agent: String,

    /// How long idle pooled connections are kept, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections per backend host.
    pub pool_max_idle_per_host: usize,
}

impl FetchConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 1000,
            connect_timeout_ms: 500,
            user_agent: "Compoxure-Request-Agent".to_string(),
            pool_idle_timeout_secs: 30,
            pool_max_idle_per_host: 32,
        }
    }
}

/// Fragment cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch. When off, every directive behaves as cache-disabled.
    pub enabled: bool,

    /// Upper bound on stored entries; writes beyond it fail (and are logged).
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

/// How a backend identity is derived from a fragment's target URL.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendIdentityRule {
    /// Host name only: every port on a host shares one circuit.
    Host,
    /// Host and (explicit or default) port.
    #[default]
    HostPort,
    /// The full target URL: one circuit per fragment endpoint.
    Url,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Enable circuit breaking. When off, every call passes through.
    pub enabled: bool,

    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Time the circuit stays open before a probe is allowed, in milliseconds.
    pub cooldown_ms: u64,

    /// Rule used to group target URLs into backends.
    pub identity: BackendIdentityRule,
}

impl CircuitBreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            cooldown_ms: 10_000,
            identity: BackendIdentityRule::HostPort,
        }
    }
}

/// Cookie forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie names forwarded to backends. Empty forwards everything.
    pub whitelist: Vec<String>,
}

/// Timeout configuration for the inbound HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Debug trace configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    /// Record per-fragment debug annotations.
    pub enabled: bool,
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount `/admin/*` on the gateway listener.
    pub enabled: bool,

    /// Bearer token required by `/admin/*` when set.
    pub api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:5000");
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.identity, BackendIdentityRule::HostPort);
        assert!(config.cookies.whitelist.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [circuit_breaker]
            failure_threshold = 2
            identity = "host"

            [cookies]
            whitelist = ["TSLCookie"]
            "#,
        )
        .unwrap();
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.cooldown_ms, 10_000);
        assert_eq!(config.circuit_breaker.identity, BackendIdentityRule::Host);
        assert_eq!(config.cookies.whitelist, vec!["TSLCookie".to_string()]);
    }
}
