// Kafka integration: an at-least-once consumer with per-message offset
// commits and a lazily-created, topic-agnostic producer.

pub mod config;
pub mod consumer;
pub mod metrics;
pub mod producer;

// Re-export commonly used types
pub use consumer::{EventConsumer, InboundMessage, MessageSource};
pub use producer::{EventPublisher, MessageSink};
