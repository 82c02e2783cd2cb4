pub mod disk;
pub mod memory;

use crate::core::cache::KeyValueCollection;
use anyhow::{Context, Result};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// Collection holding the cached `btcRates` record.
pub const RATES_COLLECTION: &str = "rates";
/// Collection holding the `lastInvoiceNumber` counter.
pub const CHECKOUT_COLLECTION: &str = "checkout";

/// A thread-safe key-value store handing out named collections. Collections
/// are persisted to a fjall keyspace when one is open, otherwise kept in memory.
pub struct KeyValueStore {
    collections: Mutex<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    pub fn open(path: &Path) -> Result<Self> {
        let cache_dir = path.join("cache");
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create directory: {}", cache_dir.display()))?;
        let keyspace = fjall::Config::new(&cache_dir)
            .open()
            .with_context(|| format!("Failed to open store at {}", cache_dir.display()))?;
        debug!("Opened store at {}", cache_dir.display());

        Ok(Self {
            collections: Mutex::new(HashMap::new()),
            keyspace: Some(keyspace),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            keyspace: None,
        }
    }

    /// Returns the named collection, creating it on first use.
    pub fn collection(&self, name: &str) -> Result<Arc<dyn KeyValueCollection>> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| anyhow::anyhow!("Store registry lock poisoned"))?;
        if let Some(collection) = collections.get(name) {
            return Ok(Arc::clone(collection));
        }

        let collection: Arc<dyn KeyValueCollection> = match &self.keyspace {
            Some(keyspace) => {
                let partition = keyspace
                    .open_partition(name, PartitionCreateOptions::default())
                    .with_context(|| format!("Failed to open collection: {name}"))?;
                Arc::new(DiskCollection::new(keyspace.clone(), partition))
            }
            None => Arc::new(MemoryCollection::new()),
        };
        collections.insert(name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_collection_is_shared_by_name() {
        let store = KeyValueStore::in_memory();
        let first = store.collection(RATES_COLLECTION).unwrap();
        let second = store.collection(RATES_COLLECTION).unwrap();

        first.put("btcRates", b"1".to_vec()).await;
        assert_eq!(second.get("btcRates").await, Some(b"1".to_vec()));

        let other = store.collection(CHECKOUT_COLLECTION).unwrap();
        assert!(other.get("btcRates").await.is_none());
    }

    #[tokio::test]
    async fn test_open_persists_collections() {
        let dir = tempdir().unwrap();
        {
            let store = KeyValueStore::open(dir.path()).unwrap();
            let checkout = store.collection(CHECKOUT_COLLECTION).unwrap();
            checkout.put("lastInvoiceNumber", b"3".to_vec()).await;
        }

        let store = KeyValueStore::open(dir.path()).unwrap();
        let checkout = store.collection(CHECKOUT_COLLECTION).unwrap();
        assert_eq!(checkout.get("lastInvoiceNumber").await, Some(b"3".to_vec()));
        assert!(dir.path().join("cache").exists());
    }
}
