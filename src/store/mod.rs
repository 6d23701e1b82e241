pub mod disk;
pub mod loader;
pub mod memory;

use crate::core::cache::{KeyValueCollection, Store};
use anyhow::{Context, Result};
use disk::{DiskCollection, FjallPriceStore};
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::{debug, info};

/// A thread-safe key-value store that can hold multiple collections, backed
/// by a single fjall keyspace that also holds the price series.
pub struct KeyValueStore {
    collections: RwLock<HashMap<(String, bool), Arc<dyn KeyValueCollection>>>,
    keyspace: Keyspace,
}

impl KeyValueStore {
    pub fn open(path: &Path) -> Result<Self> {
        let keyspace = fjall::Config::new(path.join("store"))
            .open()
            .with_context(|| format!("Failed to open data store at {}", path.display()))?;
        info!("Opened data store at {}", path.display());

        Ok(Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        })
    }

    pub fn price_store(&self) -> Result<FjallPriceStore> {
        FjallPriceStore::open(&self.keyspace)
    }
}

impl Store for KeyValueStore {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>> {
        let key = (name.to_string(), persist);
        if let Some(collection) = self
            .collections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Some(Arc::clone(collection));
        }
        if !create_if_missing {
            return None;
        }

        let new_collection: Arc<dyn KeyValueCollection> = if persist {
            match self
                .keyspace
                .open_partition(name, PartitionCreateOptions::default())
            {
                Ok(partition) => Arc::new(DiskCollection::new(partition)),
                Err(e) => {
                    debug!("Failed to open collection {}: {}", name, e);
                    return None;
                }
            }
        } else {
            Arc::new(MemoryCollection::new())
        };

        let mut collections = self.collections.write().unwrap_or_else(|e| e.into_inner());
        Some(Arc::clone(collections.entry(key).or_insert(new_collection)))
    }
}
