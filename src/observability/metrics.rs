//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Per-fragment stats named after the fragment's metric key
//! - Circuit breaker state per backend
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `{key}.cacheHit` / `{key}.cacheMiss` / `{key}.cacheDisabled` (counter)
//! - `{key}.responseTime` (histogram, milliseconds): fetched responses
//! - `{key}.cacheHit.responseTime` / `{key}.failure.responseTime` (histogram): hits and failures
//! - `{key}.failure` (counter)
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_circuit_transitions_total` (counter): by backend, state
//! - `gateway_requests_total` / `gateway_request_duration_seconds`: HTTP surface
//!
//! # Design Decisions
//! - Per-fragment names go through the `StatsEmitter` seam so tests can record them
//! - The Prometheus exporter rewrites `.` in names to `_`

use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Sink for per-fragment statistics.
pub trait StatsEmitter: Send + Sync {
    /// Increment the counter `name` by one.
    fn increment(&self, name: &str);

    /// Record one timing sample for `name`.
    fn timing(&self, name: &str, elapsed: Duration);
}

/// Emits through the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsStats;

impl StatsEmitter for MetricsStats {
    fn increment(&self, name: &str) {
        counter!(name.to_string()).increment(1);
    }

    fn timing(&self, name: &str, elapsed: Duration) {
        histogram!(name.to_string()).record(elapsed.as_secs_f64() * 1000.0);
    }
}

/// A recorded stat.
#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    Increment(String),
    Timing(String, Duration),
}

/// Keeps every stat in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingStats {
    stats: Mutex<Vec<Stat>>,
}

impl RecordingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Stat> {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Names of all counters incremented so far.
    pub fn increments(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .filter_map(|s| match s {
                Stat::Increment(name) => Some(name),
                Stat::Timing(..) => None,
            })
            .collect()
    }

    fn push(&self, stat: Stat) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.push(stat);
        }
    }
}

impl StatsEmitter for RecordingStats {
    fn increment(&self, name: &str) {
        self.push(Stat::Increment(name.to_string()));
    }

    fn timing(&self, name: &str, elapsed: Duration) {
        self.push(Stat::Timing(name.to_string(), elapsed));
    }
}

/// Record a circuit state change for `backend`.
pub fn record_circuit_transition(backend: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("gateway_circuit_state", "backend" => backend.to_string()).set(value);
    counter!(
        "gateway_circuit_transitions_total",
        "backend" => backend.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
}

/// Record one request served by the HTTP surface.
pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("gateway_requests_total", "endpoint" => endpoint, "status" => status.clone()).increment(1);
    histogram!("gateway_request_duration_seconds", "endpoint" => endpoint, "status" => status)
        .record(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_stats_keeps_order() {
        let stats = RecordingStats::new();
        stats.increment("a.cacheMiss");
        stats.timing("a.responseTime", Duration::from_millis(12));
        stats.increment("a.failure");

        assert_eq!(stats.increments(), vec!["a.cacheMiss", "a.failure"]);
        assert_eq!(
            stats.recorded()[1],
            Stat::Timing("a.responseTime".into(), Duration::from_millis(12))
        );
    }

    #[test]
    fn test_metrics_calls_without_recorder_are_noops() {
        MetricsStats.increment("svc_header.cacheHit");
        MetricsStats.timing("svc_header.responseTime", Duration::from_millis(3));
        record_circuit_transition("svc:80", CircuitState::Open);
        record_request("fragment", 200, Instant::now());
    }
}
