//! Key-value cache used to memoize first result pages.
//!
//! The executor only depends on [`SearchCache`]; [`MemoryCache`] is the
//! in-process implementation and [`NoopCache`] disables caching.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// String key-value store with per-entry TTL. Values are opaque; callers own
/// their encoding.
#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// TTL map guarded by a mutex. Expired entries are dropped lazily.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SearchCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        if ttl.is_zero() {
            entries.remove(key);
            return Ok(());
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}

pub struct NoopCache;

#[async_trait]
impl SearchCache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{MemoryCache, NoopCache, SearchCache};

    #[tokio::test]
    async fn memory_cache_returns_live_entries() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_secs(30))
            .await
            .expect("set");
        assert_eq!(cache.get("k").await.expect("get"), Some("v".to_string()));
        assert_eq!(cache.get("missing").await.expect("get"), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_millis(20))
            .await
            .expect("set");
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.expect("get"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn overwrite_is_last_writer_wins() {
        let cache = MemoryCache::new();
        cache
            .set("k", "first".to_string(), Duration::from_secs(30))
            .await
            .expect("set");
        cache
            .set("k", "second".to_string(), Duration::from_secs(30))
            .await
            .expect("set");
        assert_eq!(cache.get("k").await.expect("get"), Some("second".to_string()));
    }

    #[tokio::test]
    async fn zero_ttl_does_not_store() {
        let cache = MemoryCache::new();
        cache
            .set("k", "v".to_string(), Duration::ZERO)
            .await
            .expect("set");
        assert_eq!(cache.get("k").await.expect("get"), None);
    }

    #[tokio::test]
    async fn noop_cache_never_hits() {
        let cache = NoopCache;
        cache
            .set("k", "v".to_string(), Duration::from_secs(30))
            .await
            .expect("set");
        assert_eq!(cache.get("k").await.expect("get"), None);
    }
}
