//! In-process fragment cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::cache::{CacheError, CacheLookup, FragmentCache};

#[derive(Debug, Clone)]
struct CacheEntry {
    content: String,
    written_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.written_at) < self.ttl
    }
}

/// A sharded, thread-safe TTL cache.
///
/// Expired entries are kept so they can be served as stale content; they are
/// only evicted when a write would exceed `max_entries`.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, CacheEntry>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Count of (fresh, expired) entries, taken in one pass over the shards.
    pub fn summary(&self) -> (usize, usize) {
        let now = Instant::now();
        self.inner.iter().fold((0, 0), |(fresh, expired), entry| {
            if entry.value().is_fresh(now) {
                (fresh + 1, expired)
            } else {
                (fresh, expired + 1)
            }
        })
    }

    fn evict_expired(&self) {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.is_fresh(now));
        tracing::debug!(evicted = before - self.inner.len(), "Evicted expired fragments");
    }
}

#[async_trait]
impl FragmentCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<CacheLookup, CacheError> {
        let Some(entry) = self.inner.get(key) else {
            return Ok(CacheLookup::miss());
        };

        if entry.is_fresh(Instant::now()) {
            Ok(CacheLookup::hit(entry.content.clone()))
        } else {
            Ok(CacheLookup::expired(entry.content.clone()))
        }
    }

    async fn set(&self, key: &str, content: &str, ttl: Duration) -> Result<(), CacheError> {
        if !self.inner.contains_key(key) && self.inner.len() >= self.max_entries {
            self.evict_expired();
            if self.inner.len() >= self.max_entries {
                return Err(CacheError::Write {
                    key: key.to_string(),
                    reason: format!("cache full ({} entries)", self.max_entries),
                });
            }
        }

        self.inner.insert(
            key.to_string(),
            CacheEntry {
                content: content.to_string(),
                written_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = MemoryCache::new(10);
        assert_eq!(cache.get("k").await.unwrap(), CacheLookup::miss());

        cache.set("k", "<p>hi</p>", Duration::from_secs(60)).await.unwrap();
        let lookup = cache.get("k").await.unwrap();
        assert_eq!(lookup.content.as_deref(), Some("<p>hi</p>"));
        assert_eq!(lookup.stale, None);
    }

    #[tokio::test]
    async fn test_repeated_reads_are_identical() {
        let cache = MemoryCache::new(10);
        cache.set("k", "body", Duration::from_secs(60)).await.unwrap();
        let first = cache.get("k").await.unwrap();
        let second = cache.get("k").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_stale_not_fresh() {
        let cache = MemoryCache::new(10);
        cache.set("k", "old", Duration::from_secs(1)).await.unwrap();

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cache.get("k").await.unwrap().content.as_deref(), Some("old"));

        tokio::time::advance(Duration::from_millis(1)).await;
        let lookup = cache.get("k").await.unwrap();
        assert_eq!(lookup.content, None);
        assert_eq!(lookup.stale.as_deref(), Some("old"));
        assert_eq!(cache.summary(), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_expire_independently() {
        let cache = MemoryCache::new(10);
        cache.set("short", "a", Duration::from_secs(1)).await.unwrap();
        cache.set("long", "b", Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("short").await.unwrap().content.is_none());
        assert_eq!(cache.get("long").await.unwrap().content.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_counts_fresh_and_expired() {
        let cache = MemoryCache::new(10);
        assert_eq!(cache.summary(), (0, 0));

        cache.set("short", "a", Duration::from_secs(1)).await.unwrap();
        cache.set("long", "b", Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.summary(), (2, 0));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.summary(), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_evicts_expired_then_rejects() {
        let cache = MemoryCache::new(2);
        cache.set("a", "1", Duration::from_secs(1)).await.unwrap();
        cache.set("b", "2", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("c", "3", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.len(), 2);

        let err = cache.set("d", "4", Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, CacheError::Write { .. }));

        // Overwriting an existing key never counts against the limit.
        cache.set("b", "2b", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("b").await.unwrap().content.as_deref(), Some("2b"));
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let cache = MemoryCache::new(1000);
        let mut handles = Vec::new();
        for i in 0..50 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("k{}", i);
                cache.set(&key, &key, Duration::from_secs(60)).await.unwrap();
                cache.get(&key).await.unwrap().content
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(format!("k{}", i)));
        }
        assert_eq!(cache.len(), 50);
    }
}
