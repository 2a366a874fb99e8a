//! Fragment directives and the pure transforms that feed them.
//!
//! # Data Flow
//! ```text
//! inbound request (query, cookies)
//!     → context.rs (template variables, whitelisted Cookie header)
//!     → directive.rs (FragmentDirective with URL rendered)
//!     → keys.rs (cache key + metric key)
//!     → resolver pipeline
//! ```

pub mod context;
pub mod directive;
pub mod error;
pub mod keys;

pub use directive::{ErrorPolicy, FragmentDirective, CACHE_ONLY_URL};
pub use error::FragmentError;
