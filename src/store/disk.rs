use crate::core::cache::KeyValueCollection;
use anyhow::Result;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use std::time::Duration;
use tracing::{debug, warn};

/// Collection stored in a fjall partition. Writes are synced before returning.
///
/// Entries are durable and never expire; a TTL passed to `put` is ignored.
pub struct DiskCollection {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(keyspace: Keyspace, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
        }
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.partition.get(key)?.map(|value| value.to_vec()))
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.partition.insert(key, value)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.read(key) {
            Ok(Some(value)) => {
                debug!(key = %String::from_utf8_lossy(key), "Disk HIT");
                Some(value)
            }
            Ok(None) => {
                debug!(key = %String::from_utf8_lossy(key), "Disk MISS");
                None
            }
            Err(e) => {
                warn!(key = %String::from_utf8_lossy(key), error = %e, "Durable read failed");
                None
            }
        }
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) {
        if ttl.is_some() {
            debug!(key = %String::from_utf8_lossy(key), "Ignoring TTL on durable collection");
        }
        match self.write(key, value) {
            Ok(()) => debug!(key = %String::from_utf8_lossy(key), "Disk PUT"),
            Err(e) => {
                warn!(key = %String::from_utf8_lossy(key), error = %e, "Durable write failed")
            }
        }
    }
}
