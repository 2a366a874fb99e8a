//! Fragment resolution.
//!
//! # Data Flow
//! ```text
//! page request
//!     → page.rs (one task per directive, one ChannelSink each)
//!     → pipeline.rs (cache → breaker → fetch, per directive)
//!     → policy.rs (ErrorHandler decides what a failure renders as)
//!     → sink.rs (content delivered exactly once)
//!     → page.rs join: content in directive order, page status, Cache-Control
//! ```
//!
//! # Design Decisions
//! - The pipeline owns no policy: failures and stale content go to an `ErrorHandler`
//! - Sinks are consumed by `end`, so a fragment cannot be written twice
//! - No cross-fragment cancellation

pub mod page;
pub mod pipeline;
pub mod policy;
pub mod sink;

pub use page::{resolve_page, FragmentResult, PageResult};
pub use pipeline::{FragmentResolver, Resolution};
pub use policy::{ErrorHandler, PolicyErrorHandler, Substitution};
pub use sink::{ChannelSink, OutputSink};
