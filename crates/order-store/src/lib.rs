pub mod memory_order_store;
pub mod postgres_order_store;

pub use memory_order_store::MemoryOrderStore;
pub use postgres_order_store::PostgresOrderStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Durable storage of validated order payloads, keyed by order id.
///
/// The store is the single source of truth for "has this id been seen":
/// uniqueness is enforced by the backend, never by a read-then-write check.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::AlreadyExists`] when `id` is taken.
    async fn add_order(&self, id: &str, payload: Bytes) -> Result<(), StoreError>;

    /// Load every stored record. Fails with [`StoreError::NotFound`] when the store is empty.
    async fn get_orders(&self) -> Result<HashMap<String, Bytes>, StoreError>;

    /// Release backend resources. Only the first call has an effect.
    async fn close(&self);
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order already exists: {0}")]
    AlreadyExists(String),

    #[error("No orders found")]
    NotFound,

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether the failed operation may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Database(_))
    }
}
