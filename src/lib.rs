//! Page-composition gateway: fragment resolution library.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                  FRAGMENT GATEWAY                     │
//!                      │                                                       │
//!   Page request       │  ┌────────┐    ┌──────────┐    ┌──────────────────┐  │
//!   ───────────────────┼─▶│  http  │───▶│ fragment │───▶│ resolver (page)  │  │
//!                      │  │ server │    │directive │    │ one task / frag  │  │
//!                      │  └────────┘    └──────────┘    └────────┬─────────┘  │
//!                      │                                         ▼            │
//!                      │                ┌───────┐       ┌──────────────────┐  │
//!                      │                │ cache │◀─────▶│ resolver         │  │
//!                      │                └───────┘       │ (pipeline)       │  │
//!                      │                                └────────┬─────────┘  │
//!                      │                                         ▼            │
//!                      │                ┌────────────┐   ┌──────────────┐     │
//!                      │                │ resilience │──▶│    fetch     │─────┼──▶ Backend
//!                      │                │  breaker   │   │ (hyper pool) │     │
//!                      │                └────────────┘   └──────────────┘     │
//!                      │                                                       │
//!                      │  config · observability · lifecycle · admin           │
//!                      └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod cache;
pub mod fetch;
pub mod fragment;
pub mod resolver;

// Surfaces
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use resolver::{FragmentResolver, PolicyErrorHandler};
