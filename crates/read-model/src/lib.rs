pub mod cache;
pub mod lookup;

pub use cache::OrderCache;
pub use lookup::{lookup_order, OrderLookup};

use order_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Order already cached: {0}")]
    AlreadyExists(String),

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Cache lock poisoned")]
    Poisoned,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CacheError {
    /// True for an absent key and for an empty backing store.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::NotFound(_) | CacheError::Store(StoreError::NotFound)
        )
    }
}
