use anyhow::{Context, Result};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use common::PublisherConfig;
use messaging::{generate_message, OrderPublisher};
use tracing::info;
use uuid::Uuid;

/// Publishes one order built from a template file, then exits.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_telemetry(TelemetryConfig::from_env("order-publisher"))
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let config = PublisherConfig::from_env();

    let template = tokio::fs::read(&config.template_path)
        .await
        .with_context(|| format!("Failed to read template {}", config.template_path.display()))?;

    let order_uid = config
        .order_uid
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let message = generate_message(&template, &order_uid)?;

    let publisher = OrderPublisher::new(&config.brokers, &config.client_id, config.topic.clone())?;
    publisher.publish(&order_uid, &message).await?;

    info!(order_uid = %order_uid, topic = %config.topic, "Published order");
    println!("{}", order_uid);

    shutdown_telemetry();
    Ok(())
}
