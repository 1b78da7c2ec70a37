//! Opt-in prediction cache.
//!
//! [`PredictionCache`] stores parsed predictions keyed on a content hash of
//! (model, prompt payload). Re-uploads of the same sheet are common, and the
//! prompt is deterministic for identical rows, so an exact-payload key gives
//! real hit rates without any fuzzy matching.
//!
//! # Architecture
//!
//! The cache sits in [`BatchEngine`](crate::BatchEngine), above the retry
//! decorator. A cache hit bypasses retry logic and the provider call
//! entirely. Cache hit/miss metrics are emitted separately.
//!
//! The key hash uses `DefaultHasher` (SipHash), deterministic within a
//! process lifetime — sufficient for an in-memory cache. A future shared
//! backend would need a stable cross-process hash instead.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use moka::future::Cache;

use crate::telemetry;
use crate::types::PredictionRecord;

/// Configuration for the prediction cache.
///
/// Pass to [`ChemSnapBuilder::cache()`](crate::ChemSnapBuilder::cache) to
/// activate.
///
/// ```rust
/// # use chemsnap::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(10_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached batches. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: 1 hour.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached batches.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// In-memory cache of parsed batch predictions.
pub struct PredictionCache {
    cache: Cache<u64, Vec<PredictionRecord>>,
}

impl PredictionCache {
    /// Create a new prediction cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    /// Look up cached predictions for a batch payload.
    ///
    /// Returns `None` on cache miss. Emits cache hit/miss metrics.
    pub async fn get(&self, model: &str, payload: &str) -> Option<Vec<PredictionRecord>> {
        let key = cache_key("classify", model, payload);
        match self.cache.get(&key).await {
            Some(records) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => "classify")
                    .increment(1);
                Some(records)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => "classify")
                    .increment(1);
                None
            }
        }
    }

    /// Insert parsed predictions for a batch payload.
    pub async fn insert(&self, model: &str, payload: &str, records: Vec<PredictionRecord>) {
        let key = cache_key("classify", model, payload);
        self.cache.insert(key, records).await;
    }
}

/// Compute a cache key from operation, model, and payload.
fn cache_key(operation: &str, model: &str, payload: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    operation.hash(&mut hasher);
    model.hash(&mut hasher);
    payload.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_deterministic() {
        let k1 = cache_key("classify", "nova", "payload");
        let k2 = cache_key("classify", "nova", "payload");
        assert_eq!(k1, k2);
    }

    #[test]
    fn cache_key_differs_on_model() {
        let k1 = cache_key("classify", "nova", "payload");
        let k2 = cache_key("classify", "gpt-4o", "payload");
        assert_ne!(k1, k2);
    }

    #[test]
    fn cache_key_differs_on_payload() {
        let k1 = cache_key("classify", "nova", "payload-a");
        let k2 = cache_key("classify", "nova", "payload-b");
        assert_ne!(k1, k2);
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let cache = PredictionCache::new(&CacheConfig::new());
        assert!(cache.get("nova", "payload").await.is_none());
        cache.insert("nova", "payload", vec![]).await;
        assert_eq!(cache.get("nova", "payload").await, Some(vec![]));
    }
}
