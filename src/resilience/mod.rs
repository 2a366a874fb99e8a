//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Fragment fetch:
//!     → circuit_breaker.rs (reject fast if the backend's circuit is open)
//!     → fetch (timeout enforced by the fetcher)
//!     → circuit_breaker.rs (record outcome, open/close circuit)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every fragment fetch has a deadline
//! - No retries: half-open probing is the only recovery path
//! - Circuit breaker prevents cascading failures across a page

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState};
