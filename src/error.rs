use thiserror::Error;

/// An event could not be serialized for the wire.
#[derive(Debug, Error)]
#[error("failed to encode event: {source}")]
pub struct EncodingError {
    #[from]
    pub source: serde_json::Error,
}

/// An inbound payload could not be turned back into a typed value.
///
/// Carries a short prefix of the offending payload so the log line is
/// enough to identify the bad message without replaying the topic.
#[derive(Debug, Error)]
#[error("failed to decode payload: {source}; payload starts with {snippet:?}")]
pub struct DecodingError {
    #[source]
    pub source: serde_json::Error,
    pub snippet: String,
}

impl DecodingError {
    const SNIPPET_LEN: usize = 120;

    pub fn new(source: serde_json::Error, payload: &[u8]) -> Self {
        let end = payload.len().min(Self::SNIPPET_LEN);
        Self {
            source,
            snippet: String::from_utf8_lossy(&payload[..end]).into_owned(),
        }
    }
}

/// Errors raised by the consumer side of the broker connection.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("failed to create kafka consumer: {0}")]
    Create(#[source] rdkafka::error::KafkaError),

    #[error("failed to subscribe to topics {topics:?}: {source}")]
    Subscribe {
        topics: Vec<String>,
        #[source]
        source: rdkafka::error::KafkaError,
    },

    #[error("failed to fetch message from broker: {0}")]
    Fetch(#[source] rdkafka::error::KafkaError),

    #[error("failed to commit offset {offset} for {topic}[{partition}]: {source}")]
    Commit {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: rdkafka::error::KafkaError,
    },
}

/// Errors raised while publishing an event.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("failed to create kafka producer: {0}")]
    Connect(#[source] rdkafka::error::KafkaError),

    #[error("broker did not acknowledge message on '{topic}' within {timeout_ms}ms")]
    Timeout { topic: String, timeout_ms: u64 },

    #[error("broker rejected message on '{topic}': {source}")]
    Rejected {
        topic: String,
        #[source]
        source: rdkafka::error::KafkaError,
    },
}

/// A handler name was registered twice.
#[derive(Debug, Error)]
#[error("task handler '{name}' is already registered")]
pub struct DuplicateHandlerError {
    pub name: String,
}

/// A message arrived for a task name nothing is registered under.
#[derive(Debug, Error)]
#[error("no task handler registered for '{name}'")]
pub struct UnknownTaskError {
    pub name: String,
}

/// Errors from the annotation service HTTP API.
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("annotation service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("annotation service returned status {status} for {operation}")]
    Status { operation: &'static str, status: u16 },
}

/// Errors from the upload task store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upload task with uuid '{upload_uuid}' already exists")]
    DuplicateUpload { upload_uuid: String },

    #[error("upload task '{upload_uuid}' is missing or already in a terminal status")]
    StaleTransition { upload_uuid: String },

    #[error("unknown upload task status '{0}' in store")]
    InvalidStatus(String),

    #[error("upload task store query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Errors from processing one upload request end to end.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload '{upload_uuid}' was already requested")]
    Duplicate { upload_uuid: String },

    #[error("annotation service call failed: {0}")]
    External(#[from] ExternalServiceError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for UploadError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUpload { upload_uuid } => UploadError::Duplicate { upload_uuid },
            other => UploadError::Store(other),
        }
    }
}
