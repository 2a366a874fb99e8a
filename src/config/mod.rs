//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed by value to each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use duration::parse_duration;
pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BackendIdentityRule, CacheConfig, CircuitBreakerConfig, CookieConfig,
    DebugConfig, FetchConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, TimeoutConfig,
};
