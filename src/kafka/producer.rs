use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use tracing::{debug, error, info};

use super::config::create_client_config;
use super::metrics;
use crate::config::KafkaConfig;
use crate::error::PublishError;
use crate::events::codec;
use crate::events::types::Event;

/// Sink for outbound messages.
///
/// Production code uses [`EventPublisher`]; tests substitute a recording
/// sink to observe publishes without a broker.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Publishes an encoded payload keyed for partition affinity and
    /// waits for broker acknowledgment.
    async fn publish_raw(
        &self,
        topic: &str,
        payload: &[u8],
        key: &str,
    ) -> Result<(i32, i64), PublishError>;
}

/// Kafka event publisher with at-least-once delivery guarantees.
///
/// The underlying producer is created on first publish, not at
/// construction, so components that never publish (or processes that exit
/// before publishing) never open a broker connection. One publisher is
/// shared across all topics; the topic is an argument of each publish.
///
/// # Configuration
/// - `acks=all`: wait for all in-sync replicas to acknowledge
/// - `enable.idempotence=true`: no duplicates within a producer session
/// - `retries=2147483647`: retry transient errors until the delivery timeout
/// - `linger.ms=10`: small batching window for low latency
pub struct EventPublisher {
    config: KafkaConfig,
    producer: OnceCell<FutureProducer>,
}

impl EventPublisher {
    pub fn new(config: KafkaConfig) -> Self {
        Self {
            config,
            producer: OnceCell::new(),
        }
    }

    fn producer(&self) -> Result<&FutureProducer, PublishError> {
        self.producer.get_or_try_init(|| {
            info!(brokers = %self.config.brokers, "Initializing Kafka producer");

            let mut client_config = create_client_config(&self.config);
            client_config
                // Reliability settings
                .set("acks", "all")
                .set("enable.idempotence", "true")
                .set("max.in.flight.requests.per.connection", "5")
                .set("retries", "2147483647")
                // Performance settings
                .set("compression.type", "lz4")
                .set("linger.ms", "10")
                .set("batch.size", "16384")
                // Timeout settings
                .set("request.timeout.ms", "30000")
                .set("delivery.timeout.ms", "120000")
                .create()
                .map_err(PublishError::Connect)
        })
    }

    /// Encodes and publishes one event, waiting for broker acknowledgment.
    ///
    /// The key determines the partition, so all events sharing a key are
    /// totally ordered for consumers.
    ///
    /// Returns the `(partition, offset)` the broker assigned.
    pub async fn publish(
        &self,
        topic: &str,
        event: &Event,
        key: &str,
    ) -> Result<(i32, i64), PublishError> {
        let payload = codec::encode(event)?;
        self.publish_raw(topic, &payload, key).await
    }

    /// Publishes an already-encoded payload, waiting for broker acknowledgment.
    pub async fn publish_raw(
        &self,
        topic: &str,
        payload: &[u8],
        key: &str,
    ) -> Result<(i32, i64), PublishError> {
        let producer = self.producer()?;
        let ack_timeout = Duration::from_millis(self.config.producer_timeout_ms);

        let record = FutureRecord::to(topic).key(key.as_bytes()).payload(payload);

        // Bound the whole wait for the broker acknowledgment, not just the
        // enqueue. The record may still be delivered after the deadline;
        // at-least-once semantics make that acceptable.
        let start = Instant::now();
        let send = producer.send(record, Timeout::After(ack_timeout));
        match tokio::time::timeout(ack_timeout, send).await {
            Err(_elapsed) => {
                metrics::PRODUCE_FAILURE.inc();

                error!(
                    topic = topic,
                    key = key,
                    timeout_ms = self.config.producer_timeout_ms,
                    "Broker did not acknowledge publish in time"
                );

                Err(PublishError::Timeout {
                    topic: topic.to_string(),
                    timeout_ms: self.config.producer_timeout_ms,
                })
            }
            Ok(Ok((partition, offset))) => {
                let latency = start.elapsed();

                metrics::PRODUCE_SUCCESS.inc();
                metrics::PRODUCE_LATENCY.observe(latency.as_secs_f64());

                debug!(
                    topic = topic,
                    key = key,
                    partition = partition,
                    offset = offset,
                    latency_ms = latency.as_millis(),
                    "Event published"
                );

                Ok((partition, offset))
            }
            Ok(Err((kafka_err, _))) => {
                metrics::PRODUCE_FAILURE.inc();

                error!(
                    error = %kafka_err,
                    topic = topic,
                    key = key,
                    latency_ms = start.elapsed().as_millis(),
                    "Failed to publish event"
                );

                match kafka_err {
                    KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => {
                        Err(PublishError::Timeout {
                            topic: topic.to_string(),
                            timeout_ms: self.config.producer_timeout_ms,
                        })
                    }
                    source => Err(PublishError::Rejected {
                        topic: topic.to_string(),
                        source,
                    }),
                }
            }
        }
    }
}

#[async_trait]
impl MessageSink for EventPublisher {
    async fn publish_raw(
        &self,
        topic: &str,
        payload: &[u8],
        key: &str,
    ) -> Result<(i32, i64), PublishError> {
        EventPublisher::publish_raw(self, topic, payload, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventType;

    fn unreachable_config() -> KafkaConfig {
        KafkaConfig {
            brokers: "127.0.0.1:1".to_string(),
            upload_topic: "cvat-upload".to_string(),
            lifecycle_topic: "detected-objects".to_string(),
            consumer_group: "test-group".to_string(),
            ssl_enabled: false,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            producer_timeout_ms: 100,
            poll_timeout_ms: 100,
        }
    }

    #[tokio::test]
    async fn unacknowledged_publish_times_out_with_the_configured_budget() {
        let publisher = EventPublisher::new(unreachable_config());
        let event = Event::new(EventType::Created, 1);

        let err = publisher
            .publish("detected-objects", &event, "1")
            .await
            .unwrap_err();

        match err {
            PublishError::Timeout { topic, timeout_ms } => {
                assert_eq!(topic, "detected-objects");
                assert_eq!(timeout_ms, 100);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
