// =============================================================================
// response_cache.rs — THE LAW REPORTS SHELF
// =============================================================================
//
// Asking the chat-completion service to summarise the same judgment twice
// costs twice as much and returns roughly the same paragraph. So every AI
// response lands here first, keyed by a blake3 hash of the text it was
// computed from, and stays for a day.
//
// The shelf is a bounded LRU: the least recently consulted report falls off
// the end when it fills up. Entries past their TTL are treated as absent and
// evicted the moment somebody asks for them.
// =============================================================================

use lru::LruCache;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

struct CachedEntry {
    stored_at: Instant,
    value: serde_json::Value,
}

/// Counters for the metrics endpoint.
pub struct CacheStats {
    pub lookups: portable_atomic::AtomicU64,
    pub hits: portable_atomic::AtomicU64,
    pub misses: portable_atomic::AtomicU64,
    pub expired: portable_atomic::AtomicU64,
    pub stores: portable_atomic::AtomicU64,
}

impl CacheStats {
    fn new() -> Self {
        Self {
            lookups: portable_atomic::AtomicU64::new(0),
            hits: portable_atomic::AtomicU64::new(0),
            misses: portable_atomic::AtomicU64::new(0),
            expired: portable_atomic::AtomicU64::new(0),
            stores: portable_atomic::AtomicU64::new(0),
        }
    }
}

/// In-process TTL + LRU cache of JSON values. Clones share the same shelf.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<LruCache<String, CachedEntry>>>,
    ttl: Duration,
    pub stats: Arc<CacheStats>,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        info!(
            capacity = capacity,
            ttl_secs = ttl.as_secs(),
            "Initializing AI response cache"
        );

        let capacity = NonZeroUsize::new(capacity).unwrap_or(FALLBACK_CAPACITY);

        Self {
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
            ttl,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// `namespace:blake3(content)` — the key for anything derived from a text.
    pub fn content_key(namespace: &str, content: &str) -> String {
        format!("{}:{}", namespace, blake3::hash(content.as_bytes()).to_hex())
    }

    /// Look up a live entry. Expired entries are evicted and reported as
    /// misses.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        use portable_atomic::Ordering;

        self.stats.lookups.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.write();
        let expired = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "AI cache hit");
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
            debug!(key = key, "AI cache entry expired");
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn put(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut entries = self.entries.write();
        entries.put(
            key.into(),
            CachedEntry {
                stored_at: Instant::now(),
                value,
            },
        );
        self.stats.stores.fetch_add(1, portable_atomic::Ordering::Relaxed);
    }

    /// Typed lookup. A stored value that no longer fits `T` counts as a miss.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key = key, error = %e, "Cached AI response has an unexpected shape — ignoring it");
                None
            }
        }
    }

    pub fn put_typed<T: Serialize>(&self, key: impl Into<String>, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.put(key, json),
            Err(e) => warn!(error = %e, "Could not serialise AI response for caching"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        use portable_atomic::Ordering;
        CacheSnapshot {
            lookups: self.stats.lookups.load(Ordering::Relaxed),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            expired: self.stats.expired.load(Ordering::Relaxed),
            stores: self.stats.stores.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

/// Serializable cache statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheSnapshot {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub stores: u64,
    pub entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_hit() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        let key = ResponseCache::content_key("principles", "the full text");
        cache.put(key.clone(), json!(["audi alteram partem"]));
        assert_eq!(cache.get(&key), Some(json!(["audi alteram partem"])));
        assert_eq!(cache.snapshot().hits, 1);
    }

    #[test]
    fn test_content_key_depends_on_namespace_and_content() {
        let a = ResponseCache::content_key("summary", "text");
        let b = ResponseCache::content_key("principles", "text");
        let c = ResponseCache::content_key("summary", "other text");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, ResponseCache::content_key("summary", "text"));
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let cache = ResponseCache::new(10, Duration::from_millis(10));
        cache.put("k", json!(1));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.snapshot().expired, 1);
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.put("a", json!(1));
        cache.put("b", json!(2));
        assert!(cache.get("a").is_some());
        cache.put("c", json!(3));
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn test_typed_lookup_rejects_wrong_shape() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.put("k", json!({"not": "a list"}));
        let typed: Option<Vec<String>> = cache.get_typed("k");
        assert!(typed.is_none());
    }
}
