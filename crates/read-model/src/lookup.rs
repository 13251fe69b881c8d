use bytes::Bytes;
use common::metrics;
use tracing::error;

use crate::{CacheError, OrderCache};

/// Result of a lookup by order id, independent of transport.
#[derive(Debug)]
pub enum OrderLookup {
    Found(Bytes),
    NotFound,
    Failed(CacheError),
}

/// Resolve `id` against the cache into exactly one outcome class.
pub fn lookup_order(cache: &OrderCache, id: &str) -> OrderLookup {
    match cache.get_order_by_id(id) {
        Ok(payload) => {
            metrics::record_cache_request(true);
            OrderLookup::Found(payload)
        }
        Err(err) if err.is_not_found() => {
            metrics::record_cache_request(false);
            OrderLookup::NotFound
        }
        Err(err) => {
            error!(order_uid = %id, error = %err, "Order lookup failed");
            OrderLookup::Failed(err)
        }
    }
}
