use super::{OrderStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use common::metrics;
use sqlx::migrate::MigrateError;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL implementation of the order store
pub struct PostgresOrderStore {
    pool: PgPool,
    closed: AtomicBool,
}

impl PostgresOrderStore {
    /// Create a new PostgreSQL order store
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            closed: AtomicBool::new(false),
        }
    }

    /// Apply pending schema migrations from the workspace `migrations/` directory
    pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
        sqlx::migrate!("../../migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn add_order(&self, id: &str, payload: Bytes) -> Result<(), StoreError> {
        let started = Instant::now();

        let result = sqlx::query("INSERT INTO orders (id, order_info) VALUES ($1, $2)")
            .bind(id)
            .bind(payload.as_ref())
            .execute(&self.pool)
            .await;

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(_) => {
                metrics::record_store_operation("add_order", true, elapsed);
                debug!(order_uid = %id, "Inserted order");
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => {
                metrics::record_store_operation("add_order", true, elapsed);
                Err(StoreError::AlreadyExists(id.to_string()))
            }
            Err(err) => {
                metrics::record_store_operation("add_order", false, elapsed);
                Err(StoreError::Database(err))
            }
        }
    }

    async fn get_orders(&self) -> Result<HashMap<String, Bytes>, StoreError> {
        let started = Instant::now();

        let rows = sqlx::query("SELECT id, order_info FROM orders")
            .fetch_all(&self.pool)
            .await
            .map_err(|err| {
                metrics::record_store_operation(
                    "get_orders",
                    false,
                    started.elapsed().as_secs_f64(),
                );
                StoreError::Database(err)
            })?;

        let mut orders = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let payload: Vec<u8> = row.try_get("order_info")?;
            orders.insert(id, Bytes::from(payload));
        }

        metrics::record_store_operation("get_orders", true, started.elapsed().as_secs_f64());
        debug!("Loaded {} orders", orders.len());

        if orders.is_empty() {
            return Err(StoreError::NotFound);
        }

        Ok(orders)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            warn!("Order store already closed");
            return;
        }
        self.pool.close().await;
        info!("Order store closed");
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == UNIQUE_VIOLATION).unwrap_or(false);
    }
    false
}
