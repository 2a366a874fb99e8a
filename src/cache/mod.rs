//! Fragment cache subsystem.
//!
//! # Data Flow
//! ```text
//! resolver pipeline
//!     → FragmentCache::get (fresh content, or stale content past TTL)
//!     → on miss: fetch → FragmentCache::set (after the sink is written)
//! ```
//!
//! # Design Decisions
//! - Cache-aside only: the cache is never authoritative
//! - Expired entries stay readable as stale content for error fallback
//! - Storage medium sits behind the `FragmentCache` trait

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use memory::MemoryCache;

/// Which cache path a fragment took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
    Disabled,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Disabled => "DISABLED",
        }
    }
}

/// Result of a cache read.
///
/// `content` is only ever a fresh hit. `stale` carries the last known body of
/// an expired entry and is never set together with `content`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheLookup {
    pub content: Option<String>,
    pub stale: Option<String>,
}

impl CacheLookup {
    pub fn hit(content: String) -> Self {
        Self {
            content: Some(content),
            stale: None,
        }
    }

    pub fn expired(stale: String) -> Self {
        Self {
            content: None,
            stale: Some(stale),
        }
    }

    pub fn miss() -> Self {
        Self::default()
    }
}

/// Cache operation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Read failed; whatever stale content could still be recovered rides along.
    #[error("cache read failed for key {key}: {reason}")]
    Read {
        key: String,
        reason: String,
        stale: Option<String>,
    },

    #[error("cache write failed for key {key}: {reason}")]
    Write { key: String, reason: String },
}

impl CacheError {
    /// Stale content recovered by a failed read, if any.
    pub fn into_stale(self) -> Option<String> {
        match self {
            CacheError::Read { stale, .. } => stale,
            CacheError::Write { .. } => None,
        }
    }
}

/// Storage for fragment bodies keyed by cache key.
#[async_trait]
pub trait FragmentCache: Send + Sync {
    /// Look up `key`, distinguishing fresh hits from expired entries.
    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError>;

    /// Store `content` under `key` for `ttl`.
    async fn set(&self, key: &str, content: &str, ttl: Duration) -> Result<(), CacheError>;
}
