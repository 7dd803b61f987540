//! Key-value collection abstractions used for the rate caches

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A named bucket of byte keys and values.
///
/// Expiring implementations make an expired entry read exactly like a missing
/// one; durable ones ignore the TTL. Storage failures are logged and reported
/// as misses.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>);
}

/// Hands out named collections, either in memory or persisted to disk.
pub trait Store: Send + Sync {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>>;
}

/// Reads and decodes a JSON value. Undecodable entries count as misses.
pub async fn get_json<T: DeserializeOwned>(
    collection: &dyn KeyValueCollection,
    key: &str,
) -> Option<T> {
    let bytes = collection.get(key.as_bytes()).await?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(key, error = %e, "Discarding undecodable cache entry");
            None
        }
    }
}

pub async fn put_json<T: Serialize>(
    collection: &dyn KeyValueCollection,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) {
    match serde_json::to_vec(value) {
        Ok(bytes) => collection.put(key.as_bytes(), &bytes, ttl).await,
        Err(e) => debug!(key, error = %e, "Failed to encode cache entry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;

    #[tokio::test]
    async fn test_json_helpers_round_trip_and_skip_garbage() {
        let collection = MemoryCollection::new();

        put_json(&collection, "key1", &vec![1, 2, 3], None).await;
        assert_eq!(
            get_json::<Vec<i32>>(&collection, "key1").await,
            Some(vec![1, 2, 3])
        );

        collection.put(b"key2", b"not json", None).await;
        assert!(get_json::<Vec<i32>>(&collection, "key2").await.is_none());
        assert!(get_json::<Vec<i32>>(&collection, "missing").await.is_none());
    }
}
