use anyhow::{Context, Result};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use common::AppConfig;
use messaging::{IngestionHandler, OrderConsumer};
use order_store::{OrderStore, PostgresOrderStore};
use read_model::OrderCache;
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod handlers;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    let telemetry = TelemetryConfig {
        log_level: config.log_level.clone(),
        ..TelemetryConfig::from_env("order-service")
    };
    init_telemetry(telemetry).map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    info!("Starting Order Service...");
    info!("Configuration:");
    info!("  Kafka Brokers: {}", config.kafka.brokers);
    info!("  Kafka Topic: {}", config.kafka.topic);
    info!("  Consumer Group: {}", config.kafka.group_id);
    info!("  Client ID: {}", config.kafka.client_id);
    info!("  HTTP Address: {}", config.http.address);

    // Connect to database
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    let store = Arc::new(PostgresOrderStore::new(pool));
    info!("Database connected successfully");

    let result = run(&config, store.clone()).await;

    // Cleanup
    info!("Shutting down order service...");
    store.close().await;
    info!("Order service stopped");
    shutdown_telemetry();

    result
}

/// Everything after the store is open. The caller closes the store whatever
/// this returns.
async fn run(config: &AppConfig, store: Arc<PostgresOrderStore>) -> Result<()> {
    PostgresOrderStore::run_migrations(store.pool()).await?;

    // Warm the cache before serving reads
    let cache = Arc::new(OrderCache::new());
    match cache.fill_from_store(store.as_ref()).await {
        Ok(count) => info!("Restored {} orders into the cache", count),
        Err(e) if e.is_not_found() => info!("Cache is empty"),
        Err(e) => return Err(e).context("Failed to restore cache from the order store"),
    }

    let handler = Arc::new(IngestionHandler::new(store, cache.clone(), config.persist_timeout));

    // Unreachable brokers are fatal before anything is served
    let kafka = config.kafka.clone();
    let consumer = tokio::task::spawn_blocking(move || OrderConsumer::connect(&kafka, handler))
        .await
        .context("Kafka connection task failed")??;

    let shutdown = CancellationToken::new();

    // Setup signal handling
    let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])?;
    let signals_handle = signals.handle();
    let signal_token = shutdown.clone();
    let signal_task = tokio::spawn(async move {
        use futures_util::stream::StreamExt;
        let mut signals = signals;
        if let Some(signal) = signals.next().await {
            info!("Received signal {}, shutting down...", signal);
            signal_token.cancel();
        }
    });

    let app = routes::create_router(AppState::new(cache, config.http.static_dir.clone()));
    let listener = match tokio::net::TcpListener::bind(config.http.address).await {
        Ok(listener) => listener,
        Err(e) => {
            signals_handle.close();
            signal_task.abort();
            return Err(e).with_context(|| format!("Failed to bind {}", config.http.address));
        }
    };
    info!("Order service listening on {}", config.http.address);

    // Whichever task stops first takes the other one down with it
    let server = {
        let token = shutdown.clone();
        async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(token.clone().cancelled_owned())
                .await;
            if let Err(e) = &result {
                error!("Server error: {}", e);
            }
            token.cancel();
            result
        }
    };

    let consuming = {
        let token = shutdown.clone();
        let consumer = &consumer;
        async move {
            let result = consumer.run(token.clone()).await;
            token.cancel();
            result
        }
    };

    let (server_result, consumer_result) = tokio::join!(server, consuming);

    signals_handle.close();
    signal_task.abort();

    server_result?;
    consumer_result?;
    Ok(())
}
