//! Per-message ingestion: decode, validate, canonicalize, persist, cache.
//!
//! Every message ends in exactly one [`IngestOutcome`]. The broker glue only
//! looks at [`IngestOutcome::should_ack`]; everything else is for logs,
//! metrics and tests.

use bytes::Bytes;
use common::metrics;
use domain::Order;
use order_store::{OrderStore, StoreError};
use read_model::OrderCache;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Why a message was discarded without touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Decode,
    Validation,
    Encode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Poison message; acknowledged so it is never redelivered.
    Dropped(DropReason),
    /// The id is already durably stored.
    Deduplicated { order_uid: String },
    /// Stored and cached.
    Persisted { order_uid: String },
    /// Stored, but the cache write failed. Repaired by the next cache rebuild.
    CacheInconsistent { order_uid: String },
    /// Store write failed; the broker must redeliver.
    RetryPending { order_uid: String },
}

impl IngestOutcome {
    pub fn should_ack(&self) -> bool {
        !matches!(self, IngestOutcome::RetryPending { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Dropped(DropReason::Decode) => "dropped_decode",
            IngestOutcome::Dropped(DropReason::Validation) => "dropped_validation",
            IngestOutcome::Dropped(DropReason::Encode) => "dropped_encode",
            IngestOutcome::Deduplicated { .. } => "deduplicated",
            IngestOutcome::Persisted { .. } => "persisted",
            IngestOutcome::CacheInconsistent { .. } => "cache_inconsistent",
            IngestOutcome::RetryPending { .. } => "retry_pending",
        }
    }

    pub fn order_uid(&self) -> Option<&str> {
        match self {
            IngestOutcome::Dropped(_) => None,
            IngestOutcome::Deduplicated { order_uid }
            | IngestOutcome::Persisted { order_uid }
            | IngestOutcome::CacheInconsistent { order_uid }
            | IngestOutcome::RetryPending { order_uid } => Some(order_uid),
        }
    }
}

/// Write-through ingestion into the order store and then the cache
pub struct IngestionHandler {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    persist_timeout: Duration,
}

impl IngestionHandler {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<OrderCache>, persist_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            persist_timeout,
        }
    }

    /// Process one message payload to a terminal outcome
    pub async fn handle(&self, payload: &[u8]) -> IngestOutcome {
        let started = Instant::now();
        let outcome = self.process(payload).await;
        metrics::record_ingest(outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn process(&self, payload: &[u8]) -> IngestOutcome {
        let order = match Order::decode(payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "Dropping message that is not a valid order document");
                return IngestOutcome::Dropped(DropReason::Decode);
            }
        };

        if let Err(e) = order.check() {
            warn!(order_uid = %order.order_uid, error = %e, "Dropping order that failed validation");
            return IngestOutcome::Dropped(DropReason::Validation);
        }

        let canonical = match order.canonical_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(order_uid = %order.order_uid, error = %e, "Dropping order that cannot be encoded");
                return IngestOutcome::Dropped(DropReason::Encode);
            }
        };

        let order_uid = order.order_uid;

        match self.persist(&order_uid, canonical.clone()).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => {
                info!(order_uid = %order_uid, "Order already exists, skipping duplicate delivery");
                return IngestOutcome::Deduplicated { order_uid };
            }
            Err(e) => {
                error!(order_uid = %order_uid, error = %e, "Failed to store order, leaving message for redelivery");
                return IngestOutcome::RetryPending { order_uid };
            }
        }

        if let Err(e) = self.cache.add_order(&order_uid, canonical) {
            error!(order_uid = %order_uid, error = %e, "Order stored but not cached");
            return IngestOutcome::CacheInconsistent { order_uid };
        }

        info!(order_uid = %order_uid, "Order stored and cached");
        IngestOutcome::Persisted { order_uid }
    }

    async fn persist(&self, order_uid: &str, payload: Bytes) -> Result<(), StoreError> {
        tokio::time::timeout(self.persist_timeout, self.store.add_order(order_uid, payload))
            .await
            .unwrap_or(Err(StoreError::Timeout(self.persist_timeout)))
    }
}
