use messaging::{generate_message, IngestOutcome, IngestionHandler};
use order_store::{MemoryOrderStore, OrderStore};
use read_model::{lookup_order, OrderCache, OrderLookup};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const TEMPLATE: &[u8] = include_bytes!("../../../demos/msg.json");

fn handler(store: Arc<MemoryOrderStore>, cache: Arc<OrderCache>) -> IngestionHandler {
    IngestionHandler::new(store, cache, Duration::from_secs(30))
}

/// Publish, look up, republish, restart: the payload survives and is stored once.
#[tokio::test]
async fn test_publish_lookup_republish_restart() {
    let store = Arc::new(MemoryOrderStore::new());
    let cache = Arc::new(OrderCache::new());
    let ingestion = handler(store.clone(), cache.clone());

    let id = Uuid::new_v4().to_string();
    let message = generate_message(TEMPLATE, &id).unwrap();

    // 1. Unknown before publish
    assert!(matches!(lookup_order(&cache, &id), OrderLookup::NotFound));

    // 2. Ingest and look up
    let outcome = ingestion.handle(&message).await;
    assert_eq!(outcome, IngestOutcome::Persisted { order_uid: id.clone() });
    assert!(outcome.should_ack());

    let served = match lookup_order(&cache, &id) {
        OrderLookup::Found(payload) => payload,
        other => panic!("expected Found, got {:?}", other),
    };
    assert_eq!(served, message);

    // 3. Republish the identical order
    let outcome = ingestion.handle(&message).await;
    assert_eq!(outcome, IngestOutcome::Deduplicated { order_uid: id.clone() });
    assert!(outcome.should_ack());
    assert_eq!(store.len().await, 1);

    // 4. Restart: a fresh cache rebuilt from the store serves the same payload
    let restarted = OrderCache::new();
    restarted.fill_from_store(store.as_ref()).await.unwrap();
    match lookup_order(&restarted, &id) {
        OrderLookup::Found(payload) => assert_eq!(payload, served),
        other => panic!("expected Found after restart, got {:?}", other),
    }
}

/// Every cached id is in the store with an identical payload.
#[tokio::test]
async fn test_cache_is_subset_of_store() {
    let store = Arc::new(MemoryOrderStore::new());
    let cache = Arc::new(OrderCache::new());
    let ingestion = handler(store.clone(), cache.clone());

    for _ in 0..10 {
        let id = Uuid::new_v4().to_string();
        let message = generate_message(TEMPLATE, &id).unwrap();
        ingestion.handle(&message).await;
        ingestion.handle(&message).await;
    }
    ingestion.handle(b"{broken").await;

    let stored = store.get_orders().await.unwrap();
    assert_eq!(stored.len(), 10);
    assert_eq!(cache.len(), stored.len());
    for (id, payload) in &stored {
        assert_eq!(&cache.get_order_by_id(id).unwrap(), payload);
    }
}

/// An empty store is a cold start, not a failure.
#[tokio::test]
async fn test_cold_start_with_empty_store() {
    let store = MemoryOrderStore::new();
    let cache = OrderCache::new();

    let err = cache.fill_from_store(&store).await.unwrap_err();

    assert!(err.is_not_found());
    assert!(cache.is_empty());
}

/// Concurrent deliveries of the same order: one persist wins, all are acknowledged.
#[tokio::test]
async fn test_concurrent_duplicate_deliveries() {
    let store = Arc::new(MemoryOrderStore::new());
    let cache = Arc::new(OrderCache::new());
    let ingestion = Arc::new(handler(store.clone(), cache.clone()));

    let id = Uuid::new_v4().to_string();
    let message = generate_message(TEMPLATE, &id).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let ingestion = ingestion.clone();
        let message = message.clone();
        tasks.push(tokio::spawn(async move { ingestion.handle(&message).await }));
    }

    let mut persisted = 0;
    for task in tasks {
        let outcome = task.await.unwrap();
        assert!(outcome.should_ack());
        if matches!(outcome, IngestOutcome::Persisted { .. }) {
            persisted += 1;
        }
    }

    assert_eq!(persisted, 1);
    assert_eq!(store.len().await, 1);
    assert_eq!(cache.get_order_by_id(&id).unwrap(), message);
}
