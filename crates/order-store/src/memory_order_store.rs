use super::{OrderStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-process order store with the same uniqueness contract as the database.
///
/// Used where a real database is unavailable, e.g. pipeline tests.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<String, Bytes>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.lock().await.is_empty()
    }

    pub async fn get(&self, id: &str) -> Option<Bytes> {
        self.orders.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn add_order(&self, id: &str, payload: Bytes) -> Result<(), StoreError> {
        match self.orders.lock().await.entry(id.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(payload);
                Ok(())
            }
        }
    }

    async fn get_orders(&self) -> Result<HashMap<String, Bytes>, StoreError> {
        let orders = self.orders.lock().await;
        if orders.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(orders.clone())
    }

    async fn close(&self) {}
}
