//! Per-fragment debug trace.
//!
//! Annotations are appended under the directive's raw URL and accumulate:
//! an options snapshot when resolution starts, a cache outcome, then one
//! terminal status with timing.

use dashmap::DashMap;
use serde::Serialize;

use crate::cache::CacheStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceStatus {
    Ok,
    Error,
}

/// One annotation, serialised as a flat object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TraceAnnotation {
    Options {
        options: serde_json::Value,
    },
    Cache {
        cache: CacheStatus,
    },
    Status {
        status: TraceStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache: Option<CacheStatus>,
        /// Milliseconds since resolution started.
        timing: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl TraceAnnotation {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TraceAnnotation::Status { .. })
    }
}

/// Append-only recorder keyed by raw directive URL.
pub trait DebugTrace: Send + Sync {
    fn add(&self, url: &str, annotation: TraceAnnotation);
}

/// In-memory recorder. A disabled recorder drops everything.
#[derive(Debug, Default)]
pub struct DebugRecorder {
    enabled: bool,
    entries: DashMap<String, Vec<TraceAnnotation>>,
}

impl DebugRecorder {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Annotations recorded for `url`, oldest first.
    pub fn entries(&self, url: &str) -> Vec<TraceAnnotation> {
        self.entries
            .get(url)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Every URL with at least one annotation.
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        urls.sort();
        urls
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl DebugTrace for DebugRecorder {
    fn add(&self, url: &str, annotation: TraceAnnotation) {
        if !self.enabled {
            return;
        }
        self.entries.entry(url.to_string()).or_default().push(annotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_accumulate() {
        let recorder = DebugRecorder::new(true);
        recorder.add("http://svc/a", TraceAnnotation::Cache { cache: CacheStatus::Miss });
        recorder.add(
            "http://svc/a",
            TraceAnnotation::Status {
                status: TraceStatus::Ok,
                cache: None,
                timing: 12,
                error: None,
            },
        );

        let entries = recorder.entries("http://svc/a");
        assert_eq!(entries.len(), 2);
        assert!(entries[1].is_terminal());
        assert_eq!(recorder.urls(), vec!["http://svc/a".to_string()]);
    }

    #[test]
    fn test_serialised_shapes() {
        let status = TraceAnnotation::Status {
            status: TraceStatus::Ok,
            cache: Some(CacheStatus::Hit),
            timing: 3,
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({"status": "OK", "cache": "HIT", "timing": 3})
        );
        let cache = TraceAnnotation::Cache { cache: CacheStatus::Miss };
        assert_eq!(serde_json::to_value(&cache).unwrap(), serde_json::json!({"cache": "MISS"}));
    }

    #[test]
    fn test_disabled_recorder_drops() {
        let recorder = DebugRecorder::new(false);
        recorder.add("u", TraceAnnotation::Cache { cache: CacheStatus::Hit });
        assert!(recorder.entries("u").is_empty());
    }
}
