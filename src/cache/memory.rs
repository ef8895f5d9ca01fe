//! In-memory stats cache
//!
//! Same contract as the Redis cache, backed by a map of value + deadline.
//! Expired entries are removed lazily on `get`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::{StatsCache, DEFAULT_TTL_SECS};
use crate::Result;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// TTL cache held entirely in process memory.
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// Cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_TTL_SECS))
    }

    /// Cache with an explicit TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live (possibly expired, not yet collected) entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatsCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().expect("cache poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                // Expired is indistinguishable from never stored.
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("cache poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("cache poisoned");
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = MemoryCache::new();
        cache.set("k", "{\"a\":1}").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let cache = MemoryCache::new();
        assert!(cache.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = MemoryCache::with_ttl(Duration::from_millis(20));
        cache.set("k", "v").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites_and_resets_ttl() {
        let cache = MemoryCache::with_ttl(Duration::from_millis(60));
        cache.set("k", "old").await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.set("k", "new").await.unwrap();

        // Past the original deadline, within the reset one.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn del_removes_entry_and_is_idempotent() {
        let cache = MemoryCache::new();
        cache.set("k", "v").await.unwrap();
        assert_eq!(cache.len(), 1);

        cache.del("k").await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.is_empty());

        // Deleting an absent key is a no-op.
        cache.del("k").await.unwrap();
    }

    #[tokio::test]
    async fn cached_null_payload_is_a_hit() {
        let cache = MemoryCache::new();
        cache.set("k", "null").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("null"));
    }
}
