pub mod consumer;
pub mod ingest;
pub mod producer;

pub use consumer::{ConsumerError, OrderConsumer};
pub use ingest::{DropReason, IngestOutcome, IngestionHandler};
pub use producer::{generate_message, OrderPublisher, PublisherError};
