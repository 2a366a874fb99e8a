//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resolver pipeline produces:
//!     → tracing events (structured log lines, `tracer` + `pc_type` fields)
//!     → metrics.rs (StatsEmitter counters and timings)
//!     → debug.rs (per-fragment annotations keyed by raw URL)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → /admin/debug
//! ```
//!
//! # Design Decisions
//! - Stats and debug traces sit behind traits so the pipeline can be observed in tests
//! - Metrics are cheap (atomic increments)

pub mod debug;
pub mod logging;
pub mod metrics;

pub use debug::{DebugRecorder, DebugTrace, TraceAnnotation, TraceStatus};
pub use metrics::{MetricsStats, RecordingStats, Stat, StatsEmitter};
