use bytes::Bytes;
use common::metrics;
use order_store::OrderStore;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::CacheError;

/// In-memory mirror of the order store.
///
/// Each id is written at most once. Readers share the lock; a writer holds it
/// exclusively for a single map operation and never across I/O.
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: RwLock<HashMap<String, Bytes>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load every stored order. Runs once at startup.
    ///
    /// An empty store surfaces as an error for which [`CacheError::is_not_found`]
    /// holds; callers treat that as a cold start. Returns the number of entries added.
    pub async fn fill_from_store(&self, store: &dyn OrderStore) -> Result<usize, CacheError> {
        let orders = store.get_orders().await?;

        let (loaded, total) = {
            let mut cached = self.write()?;
            let mut loaded = 0;
            for (id, payload) in orders {
                if let Entry::Vacant(slot) = cached.entry(id) {
                    slot.insert(payload);
                    loaded += 1;
                }
            }
            (loaded, cached.len())
        };

        metrics::set_cache_entries(total);
        info!("Cache filled from store with {} orders", loaded);
        Ok(loaded)
    }

    /// Insert if absent; an existing entry is left untouched.
    pub fn add_order(&self, id: &str, payload: Bytes) -> Result<(), CacheError> {
        let total = {
            let mut cached = self.write()?;
            match cached.entry(id.to_string()) {
                Entry::Occupied(_) => return Err(CacheError::AlreadyExists(id.to_string())),
                Entry::Vacant(slot) => {
                    slot.insert(payload);
                }
            }
            cached.len()
        };

        metrics::set_cache_entries(total);
        debug!(order_uid = %id, "Cached order");
        Ok(())
    }

    /// Stored bytes for `id`. The returned buffer is shared and read-only.
    pub fn get_order_by_id(&self, id: &str) -> Result<Bytes, CacheError> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        match self.orders.read() {
            Ok(cached) => cached.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Bytes>>, CacheError> {
        self.orders.read().map_err(|_| CacheError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Bytes>>, CacheError> {
        self.orders.write().map_err(|_| CacheError::Poisoned)
    }

    /// Panic while holding the write lock.
    #[cfg(test)]
    pub(crate) fn poison_for_test(&self) {
        let _guard = self.orders.write();
        panic!("poisoning cache lock");
    }
}
