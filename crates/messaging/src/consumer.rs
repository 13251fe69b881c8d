use common::config::KafkaConfig;
use common::metrics;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::ingest::IngestionHandler;

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);
const RECV_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Cannot reach Kafka brokers {brokers}: {source}")]
    BrokerUnavailable {
        brokers: String,
        #[source]
        source: KafkaError,
    },

    #[error("Cannot rewind {topic}[{partition}] to offset {offset}: {source}")]
    Redelivery {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: KafkaError,
    },
}

/// Where a delivered message sits in its partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MessagePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl MessagePosition {
    fn of(message: &BorrowedMessage<'_>) -> Self {
        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
        }
    }
}

/// Offset operations that settle a message's acknowledgment.
pub(crate) trait OffsetControl {
    /// Mark everything up to and including `position` as processed.
    fn commit(&self, position: &MessagePosition) -> KafkaResult<()>;

    /// Move the partition's fetch position back to `position`.
    fn rewind(&self, position: &MessagePosition) -> KafkaResult<()>;
}

impl OffsetControl for StreamConsumer {
    fn commit(&self, position: &MessagePosition) -> KafkaResult<()> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &position.topic,
            position.partition,
            Offset::Offset(position.offset + 1),
        )?;
        Consumer::commit(self, &offsets, CommitMode::Async)
    }

    fn rewind(&self, position: &MessagePosition) -> KafkaResult<()> {
        self.seek(
            &position.topic,
            position.partition,
            Offset::Offset(position.offset),
            SEEK_TIMEOUT,
        )
    }
}

/// Acknowledge or withhold. Returns the delay to wait before consuming again
/// when the message was left for redelivery.
///
/// A rewind that fails is fatal: any later commit on the same partition would
/// move the committed offset past the withheld message.
pub(crate) fn settle<C: OffsetControl + ?Sized>(
    control: &C,
    position: &MessagePosition,
    acknowledge: bool,
    retry_backoff: Duration,
) -> Result<Option<Duration>, ConsumerError> {
    if acknowledge {
        if let Err(e) = control.commit(position) {
            // Not fatal: a later commit on the partition covers this offset.
            error!(
                partition = position.partition,
                offset = position.offset,
                error = %e,
                "Error while acknowledging a message"
            );
        }
        return Ok(None);
    }

    control
        .rewind(position)
        .map_err(|source| ConsumerError::Redelivery {
            topic: position.topic.clone(),
            partition: position.partition,
            offset: position.offset,
            source,
        })?;

    debug!(
        partition = position.partition,
        offset = position.offset,
        "Message scheduled for redelivery"
    );
    Ok(Some(retry_backoff))
}

/// Durable, manually acknowledged subscription feeding the ingestion handler.
///
/// Acknowledging a message commits its offset. A withheld acknowledgment seeks
/// the partition back to that offset, so the message is delivered again after
/// the retry backoff.
pub struct OrderConsumer {
    consumer: StreamConsumer,
    handler: Arc<IngestionHandler>,
    topic: String,
    retry_backoff: Duration,
}

impl OrderConsumer {
    /// Create the Kafka client without contacting the brokers.
    pub fn new(config: &KafkaConfig, handler: Arc<IngestionHandler>) -> Result<Self, ConsumerError> {
        info!(
            group_id = %config.group_id,
            client_id = %config.client_id,
            topic = %config.topic,
            "Creating Kafka consumer"
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &config.group_id)
            .set("client.id", &config.client_id)
            .set("bootstrap.servers", &config.brokers)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "10000")
            .create()?;

        Ok(Self {
            consumer,
            handler,
            topic: config.topic.clone(),
            retry_backoff: config.retry_backoff,
        })
    }

    /// Create the client and make sure the brokers answer within
    /// `config.connect_timeout`. Blocks the calling thread.
    pub fn connect(config: &KafkaConfig, handler: Arc<IngestionHandler>) -> Result<Self, ConsumerError> {
        let consumer = Self::new(config, handler)?;

        let metadata = consumer
            .consumer
            .fetch_metadata(Some(&consumer.topic), config.connect_timeout)
            .map_err(|source| ConsumerError::BrokerUnavailable {
                brokers: config.brokers.clone(),
                source,
            })?;

        info!(
            brokers = metadata.brokers().len(),
            topic = %consumer.topic,
            "Connected to Kafka"
        );
        Ok(consumer)
    }

    /// Consume until `shutdown` is cancelled.
    ///
    /// Each message's acknowledgment is settled before the next shutdown check,
    /// so no message is left half-handled when this returns. A message that
    /// cannot be rewound for redelivery stops the loop with an error.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), ConsumerError> {
        self.consumer.subscribe(&[self.topic.as_str()])?;
        info!(topic = %self.topic, "Order consumer subscribed");

        let result = self.consume(&shutdown).await;

        self.consumer.unsubscribe();
        match &result {
            Ok(()) => info!("Stopped order consumer"),
            Err(e) => error!(error = %e, "Order consumer stopped on error"),
        }
        result
    }

    async fn consume(&self, shutdown: &CancellationToken) -> Result<(), ConsumerError> {
        loop {
            let backoff = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                received = self.consumer.recv() => match received {
                    Ok(message) => self.dispatch(&message).await?,
                    Err(e) => {
                        error!(kafka_error = %e, "Kafka consumer error");
                        Some(RECV_ERROR_BACKOFF)
                    }
                },
            };

            if let Some(delay) = backoff {
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    async fn dispatch(&self, message: &BorrowedMessage<'_>) -> Result<Option<Duration>, ConsumerError> {
        let position = MessagePosition::of(message);
        debug!(
            topic = %position.topic,
            partition = position.partition,
            offset = position.offset,
            "Received message"
        );

        let outcome = self.handler.handle(message.payload().unwrap_or_default()).await;
        metrics::record_ack(outcome.should_ack());

        settle(&self.consumer, &position, outcome.should_ack(), self.retry_backoff)
    }
}
