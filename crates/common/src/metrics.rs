use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Ingestion metrics
    pub static ref INGEST_COUNTER: CounterVec = register_counter_vec!(
        "orders_ingest_total",
        "Total number of order messages handled, by terminal outcome",
        &["outcome"]
    )
    .expect("metric cannot be created");

    pub static ref INGEST_DURATION: HistogramVec = register_histogram_vec!(
        "orders_ingest_duration_seconds",
        "Order message handling duration in seconds",
        &["outcome"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("metric cannot be created");

    pub static ref ACK_COUNTER: CounterVec = register_counter_vec!(
        "orders_acks_total",
        "Total number of broker acknowledgment decisions",
        &["decision"]
    )
    .expect("metric cannot be created");

    // Store metrics
    pub static ref STORE_OPERATIONS: CounterVec = register_counter_vec!(
        "orders_store_operations_total",
        "Total number of order store operations",
        &["operation", "status"]
    )
    .expect("metric cannot be created");

    pub static ref STORE_DURATION: HistogramVec = register_histogram_vec!(
        "orders_store_duration_seconds",
        "Order store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("metric cannot be created");

    // Cache metrics
    pub static ref CACHE_REQUESTS: CounterVec = register_counter_vec!(
        "orders_cache_requests_total",
        "Total number of cache lookups",
        &["status"]
    )
    .expect("metric cannot be created");

    pub static ref CACHE_ENTRIES: IntGauge = register_int_gauge!(
        "orders_cache_entries",
        "Number of orders held in the in-memory cache"
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the terminal outcome of one ingested message
pub fn record_ingest(outcome: &str, duration_secs: f64) {
    INGEST_COUNTER.with_label_values(&[outcome]).inc();
    INGEST_DURATION
        .with_label_values(&[outcome])
        .observe(duration_secs);
}

/// Record whether a message was acknowledged or left for redelivery
pub fn record_ack(acked: bool) {
    let decision = if acked { "ack" } else { "redeliver" };
    ACK_COUNTER.with_label_values(&[decision]).inc();
}

pub fn record_store_operation(operation: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    STORE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
    STORE_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

pub fn record_cache_request(hit: bool) {
    let status = if hit { "hit" } else { "miss" };
    CACHE_REQUESTS.with_label_values(&[status]).inc();
}

pub fn set_cache_entries(entries: usize) {
    CACHE_ENTRIES.set(entries as i64);
}
