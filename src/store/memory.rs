use crate::core::cache::KeyValueCollection;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// In-memory collection backed by a HashMap behind a mutex
#[derive(Clone, Default)]
pub struct MemoryCollection {
    inner: Arc<Mutex<HashMap<Vec<u8>, CacheValue>>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired ones included.
    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut cache = self.inner.lock().await;
        let now = Instant::now();
        match cache.get(key) {
            Some(entry) if entry.is_expired(now) => {
                debug!(key = %String::from_utf8_lossy(key), "Cache entry expired");
                cache.remove(key);
                None
            }
            Some(entry) => {
                debug!(key = %String::from_utf8_lossy(key), "Cache HIT");
                Some(entry.value.clone())
            }
            None => {
                debug!(key = %String::from_utf8_lossy(key), "Cache MISS");
                None
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) {
        let expires_at = ttl.map(|duration| Instant::now() + duration);
        let mut cache = self.inner.lock().await;

        // Opportunistic sweep so abandoned pairs do not pile up.
        let now = Instant::now();
        cache.retain(|_, entry| !entry.is_expired(now));

        debug!(key = %String::from_utf8_lossy(key), ?ttl, "Cache PUT");
        cache.insert(
            key.to_vec(),
            CacheValue {
                value: value.to_vec(),
                expires_at,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_cache_get_put() {
        let cache = MemoryCollection::new();

        // Initially, cache is empty
        assert!(cache.get(b"key1").await.is_none());

        cache.put(b"key1", b"123", None).await;

        assert_eq!(cache.get(b"key1").await, Some(b"123".to_vec()));
        assert!(cache.get(b"key2").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_ttl_expiration() {
        let cache = MemoryCollection::new();

        cache
            .put(b"key1", b"123", Some(Duration::from_millis(10)))
            .await;
        assert_eq!(cache.get(b"key1").await, Some(b"123".to_vec()));

        sleep(Duration::from_millis(20)).await;
        assert!(cache.get(b"key1").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_sweeps_expired_entries() {
        let cache = MemoryCollection::new();

        cache
            .put(b"old", b"1", Some(Duration::from_millis(5)))
            .await;
        sleep(Duration::from_millis(15)).await;
        cache.put(b"new", b"2", None).await;

        assert_eq!(cache.len().await, 1);
    }
}
