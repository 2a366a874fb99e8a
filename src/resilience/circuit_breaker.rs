//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: first call after the cool-down elapses
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails (cool-down restarts)
//! ```
//!
//! # Design Decisions
//! - Per-backend circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering backend)
//! - Each backend's state sits behind its own mutex, never held across an await

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;
use url::Url;

use crate::config::{BackendIdentityRule, CircuitBreakerConfig};
use crate::fragment::FragmentError;
use crate::observability::metrics;

/// Circuit state for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    last_probe: Option<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            last_probe: None,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

impl Circuit {
    fn open(&mut self, identity: &str, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_in_flight = false;
        tracing::warn!(
            backend = %identity,
            consecutive_failures = self.consecutive_failures,
            "Circuit opened"
        );
        metrics::record_circuit_transition(identity, CircuitState::Open);
    }

    fn close(&mut self, identity: &str) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.probe_in_flight = false;
        tracing::info!(backend = %identity, "Circuit closed");
        metrics::record_circuit_transition(identity, CircuitState::Closed);
    }
}

/// Whether a call runs as ordinary traffic or as the half-open probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permit {
    Pass,
    Probe,
}

/// Re-opens the circuit if a probe is dropped before it reports back.
struct ProbeGuard {
    circuit: Arc<Mutex<Circuit>>,
    identity: String,
    armed: bool,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut circuit = lock(&self.circuit);
            tracing::debug!(backend = %self.identity, "Probe abandoned before completion");
            circuit.open(&self.identity, Instant::now());
        }
    }
}

/// Point-in-time view of one backend's circuit.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub backend: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub since_last_failure_ms: Option<u64>,
    pub since_last_probe_ms: Option<u64>,
}

/// Per-backend circuit breakers keyed by backend identity.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    circuits: DashMap<String, Arc<Mutex<Circuit>>>,
}

fn lock(circuit: &Mutex<Circuit>) -> MutexGuard<'_, Circuit> {
    circuit.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: DashMap::new(),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Backend identity for a target URL under the configured rule.
    pub fn identity_for(&self, url: &Url) -> String {
        let host = url.host_str().unwrap_or_default();
        match self.config.identity {
            BackendIdentityRule::Host => host.to_string(),
            BackendIdentityRule::HostPort => match url.port_or_known_default() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            },
            BackendIdentityRule::Url => url.as_str().to_string(),
        }
    }

    /// Run `f` unless `identity`'s circuit rejects it.
    ///
    /// The result of `f` is returned untouched; a rejection yields a
    /// circuit-open failure for `url` without calling `f`.
    pub async fn call<F, Fut>(&self, identity: &str, url: &str, f: F) -> Result<String, FragmentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, FragmentError>>,
    {
        if !self.config.enabled {
            return f().await;
        }

        let circuit = self.circuit(identity);
        let Some(permit) = self.acquire(identity, &circuit) else {
            tracing::debug!(backend = %identity, url = %url, "Circuit open, rejecting call");
            return Err(FragmentError::circuit_open(url));
        };

        let mut guard = ProbeGuard {
            circuit: circuit.clone(),
            identity: identity.to_string(),
            armed: permit == Permit::Probe,
        };
        let result = f().await;
        guard.armed = false;

        let failed = matches!(&result, Err(e) if e.counts_against_backend());
        self.record(identity, &circuit, permit, failed);
        result
    }

    /// Current state of `identity`'s circuit, if it has seen traffic.
    pub fn state(&self, identity: &str) -> Option<CircuitState> {
        self.circuits.get(identity).map(|entry| {
            let circuit = lock(entry.value());
            circuit.state
        })
    }

    /// All known circuits, sorted by backend identity.
    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let now = Instant::now();
        let since = |t: Option<Instant>| t.map(|t| now.duration_since(t).as_millis() as u64);

        let mut snapshots: Vec<_> = self
            .circuits
            .iter()
            .map(|entry| {
                let circuit = lock(entry.value());
                CircuitSnapshot {
                    backend: entry.key().clone(),
                    state: circuit.state,
                    consecutive_failures: circuit.consecutive_failures,
                    since_last_failure_ms: since(circuit.last_failure),
                    since_last_probe_ms: since(circuit.last_probe),
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.backend.cmp(&b.backend));
        snapshots
    }

    fn circuit(&self, identity: &str) -> Arc<Mutex<Circuit>> {
        if let Some(existing) = self.circuits.get(identity) {
            return existing.value().clone();
        }
        self.circuits
            .entry(identity.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn acquire(&self, identity: &str, circuit: &Mutex<Circuit>) -> Option<Permit> {
        let now = Instant::now();
        let mut circuit = lock(circuit);

        match circuit.state {
            CircuitState::Closed => Some(Permit::Pass),
            CircuitState::Open => {
                let cooled_down = circuit
                    .opened_at
                    .map_or(true, |opened| now.duration_since(opened) >= self.config.cooldown());
                if !cooled_down {
                    return None;
                }
                circuit.state = CircuitState::HalfOpen;
                circuit.probe_in_flight = true;
                circuit.last_probe = Some(now);
                tracing::info!(backend = %identity, "Circuit half-open, probing backend");
                metrics::record_circuit_transition(identity, CircuitState::HalfOpen);
                Some(Permit::Probe)
            }
            CircuitState::HalfOpen if circuit.probe_in_flight => None,
            CircuitState::HalfOpen => {
                circuit.probe_in_flight = true;
                circuit.last_probe = Some(now);
                Some(Permit::Probe)
            }
        }
    }

    fn record(&self, identity: &str, circuit: &Mutex<Circuit>, permit: Permit, failed: bool) {
        let now = Instant::now();
        let mut circuit = lock(circuit);

        if failed {
            circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
            circuit.last_failure = Some(now);
        }

        match permit {
            Permit::Probe if failed => circuit.open(identity, now),
            Permit::Probe => circuit.close(identity),
            Permit::Pass if failed => {
                if circuit.state == CircuitState::Closed
                    && circuit.consecutive_failures >= self.config.failure_threshold
                {
                    circuit.open(identity, now);
                }
            }
            Permit::Pass => {
                // Calls admitted before the circuit opened cannot close it.
                if circuit.state == CircuitState::Closed {
                    circuit.consecutive_failures = 0;
                }
            }
        }
    }
}
