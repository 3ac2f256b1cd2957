use once_cell::sync::Lazy;
use prometheus::{register_counter, register_histogram, Counter, Histogram};

/// Acknowledged event publishes
pub static PRODUCE_SUCCESS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracklens_kafka_produce_success_total",
        "Total number of events acknowledged by the broker"
    )
    .expect("Failed to register tracklens_kafka_produce_success_total metric")
});

/// Rejected or timed-out publishes
pub static PRODUCE_FAILURE: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracklens_kafka_produce_failure_total",
        "Total number of event publishes rejected or timed out"
    )
    .expect("Failed to register tracklens_kafka_produce_failure_total metric")
});

/// Publish-to-acknowledgment latency
///
/// Buckets sized for acks=all round trips, which stretch well past local
/// enqueue latency when a replica lags.
pub static PRODUCE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tracklens_kafka_produce_latency_seconds",
        "Time from publish to broker acknowledgment in seconds",
        vec![0.005, 0.025, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register tracklens_kafka_produce_latency_seconds metric")
});

/// Messages processed and committed by the worker loop
pub static CONSUME_SUCCESS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracklens_kafka_consume_success_total",
        "Total number of consumed messages processed to completion"
    )
    .expect("Failed to register tracklens_kafka_consume_success_total metric")
});

/// Broker fetch errors seen by the worker loop
pub static CONSUME_FAILURE: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "tracklens_kafka_consume_failure_total",
        "Total number of broker fetch errors"
    )
    .expect("Failed to register tracklens_kafka_consume_failure_total metric")
});
