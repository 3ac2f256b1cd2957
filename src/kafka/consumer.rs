use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{Message, Offset, TopicPartitionList};
use tracing::{info, warn};

use super::config::create_client_config;
use crate::config::KafkaConfig;
use crate::error::ConsumeError;

/// One message fetched from the broker, detached from the client's buffers.
///
/// The consumer loop owns the message for the whole processing pass and
/// never mutates it. Topic, partition and offset are carried along so the
/// exact offset can be committed after processing.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: i64,
}

/// Source of inbound messages for the worker loop.
///
/// Production code uses [`EventConsumer`]; tests substitute a scripted
/// source to drive the loop without a broker.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetches the next message, or `None` if none arrived within the
    /// poll interval.
    async fn poll(&self) -> Result<Option<InboundMessage>, ConsumeError>;

    /// Synchronously commits the offset after the given message.
    fn commit(&self, message: &InboundMessage) -> Result<(), ConsumeError>;
}

/// Kafka consumer with manual offset management.
///
/// Auto-commit is disabled; the worker commits each message individually
/// after processing, so an uncommitted message is redelivered after a
/// crash. Duplicate processing is possible, message loss is not.
pub struct EventConsumer {
    consumer: StreamConsumer,
    poll_timeout: Duration,
}

impl EventConsumer {
    /// Creates a consumer and subscribes it to the given topics.
    ///
    /// # Configuration
    /// - `enable.auto.commit=false`: offsets are committed per message
    /// - `auto.offset.reset=earliest`: read from the beginning on first start
    /// - `session.timeout.ms=30000` / `heartbeat.interval.ms=3000`
    /// - `max.poll.interval.ms=300000`: upload processing can be slow
    pub fn new(config: &KafkaConfig, topics: &[&str]) -> Result<Self, ConsumeError> {
        info!(
            brokers = %config.brokers,
            consumer_group = %config.consumer_group,
            ?topics,
            "Initializing Kafka consumer"
        );

        let mut client_config = create_client_config(config);
        let consumer: StreamConsumer = client_config
            .set("group.id", &config.consumer_group)
            // Offset management
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            // Fetch tuning
            .set("fetch.min.bytes", "1")
            .set("fetch.wait.max.ms", "500")
            .set("max.partition.fetch.bytes", "1048576")
            // Session management
            .set("session.timeout.ms", "30000")
            .set("heartbeat.interval.ms", "3000")
            .set("max.poll.interval.ms", "300000")
            .create()
            .map_err(ConsumeError::Create)?;

        consumer
            .subscribe(topics)
            .map_err(|source| ConsumeError::Subscribe {
                topics: topics.iter().map(|t| t.to_string()).collect(),
                source,
            })?;

        info!("Kafka consumer initialized successfully");

        Ok(Self {
            consumer,
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
        })
    }

    /// Fetches the next message, waiting at most the poll interval.
    pub async fn poll(&self) -> Result<Option<InboundMessage>, ConsumeError> {
        let message = match tokio::time::timeout(self.poll_timeout, self.consumer.recv()).await {
            Err(_elapsed) => return Ok(None),
            Ok(Err(source)) => return Err(ConsumeError::Fetch(source)),
            Ok(Ok(message)) => message,
        };

        // A key that is not valid UTF-8 is dropped rather than failing the
        // whole message; the payload may still be processable.
        let key = message.key().and_then(|raw| match std::str::from_utf8(raw) {
            Ok(key) => Some(key.to_string()),
            Err(_) => {
                warn!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    "Message key is not valid UTF-8, ignoring key"
                );
                None
            }
        });

        Ok(Some(InboundMessage {
            topic: message.topic().to_string(),
            key,
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            partition: message.partition(),
            offset: message.offset(),
        }))
    }

    /// Commits the offset directly after `message`, synchronously.
    ///
    /// Committing `offset + 1` tells the broker the next fetch for this
    /// partition starts after the message just processed.
    pub fn commit(&self, message: &InboundMessage) -> Result<(), ConsumeError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )
            .and_then(|()| self.consumer.commit(&offsets, CommitMode::Sync))
            .map_err(|source| ConsumeError::Commit {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                source,
            })
    }
}

#[async_trait]
impl MessageSource for EventConsumer {
    async fn poll(&self) -> Result<Option<InboundMessage>, ConsumeError> {
        EventConsumer::poll(self).await
    }

    fn commit(&self, message: &InboundMessage) -> Result<(), ConsumeError> {
        EventConsumer::commit(self, message)
    }
}
