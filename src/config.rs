use anyhow::Result;

// ============================================================================
// Configuration Constants
// ============================================================================

const DEFAULT_HEALTH_PORT: u16 = 8081;

// Broker wait budgets (in milliseconds)
const DEFAULT_PRODUCER_TIMEOUT_MS: u64 = 2000;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 1000;

// Annotation service defaults
const DEFAULT_SESSION_TTL_SECS: u64 = 600;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// The annotation service degrades on oversized tasks
const DEFAULT_MAX_FRAMES_PER_TASK: usize = 200;

// ============================================================================
// Configuration Structures
// ============================================================================

/// Kafka connection and timing configuration
#[derive(Clone, Debug)]
pub struct KafkaConfig {
    /// Comma-separated list of Kafka brokers (e.g., "kafka1:9092,kafka2:9092")
    pub brokers: String,
    /// Topic carrying upload request messages
    pub upload_topic: String,
    /// Topic carrying detected object lifecycle events
    pub lifecycle_topic: String,
    /// Consumer group ID for upload workers
    pub consumer_group: String,
    /// SSL/TLS enabled
    pub ssl_enabled: bool,
    /// SASL mechanism (e.g., "SCRAM-SHA-256", "PLAIN")
    pub sasl_mechanism: Option<String>,
    /// SASL username
    pub sasl_username: Option<String>,
    /// SASL password
    pub sasl_password: Option<String>,
    /// How long a publish waits for broker acknowledgment
    pub producer_timeout_ms: u64,
    /// How long one consumer poll waits before reporting "no message"
    pub poll_timeout_ms: u64,
}

/// Annotation service (CVAT) configuration
#[derive(Clone, Debug)]
pub struct AnnotationConfig {
    /// Annotation service base URL (e.g., "https://cvat.example.com")
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Organization slug sent with each request, if the service uses one
    pub organization: Option<String>,
    /// Session token lifetime; a new login happens after this many seconds
    pub session_ttl_secs: u64,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

/// Upload pipeline configuration
#[derive(Clone, Debug)]
pub struct UploadsConfig {
    /// Public dashboard base URL; frame images are served from here
    pub dashboard_url: String,
    /// Maximum number of frames in one annotation task
    pub max_frames_per_task: usize,
}

/// Database connection pool configuration
#[derive(Clone, Debug)]
pub struct DbConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Timeout for acquiring a connection from the pool (seconds)
    pub acquire_timeout_secs: u64,
    /// Timeout for idle connections before they are closed (seconds)
    pub idle_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub health_port: u16,
    pub rust_log: String,
    pub kafka: KafkaConfig,
    pub annotation: AnnotationConfig,
    pub uploads: UploadsConfig,
    pub db: DbConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            health_port: std::env::var("HEALTH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_HEALTH_PORT),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                upload_topic: std::env::var("KAFKA_UPLOAD_TOPIC")
                    .unwrap_or_else(|_| "cvat-upload".to_string()),
                lifecycle_topic: std::env::var("KAFKA_LIFECYCLE_TOPIC")
                    .unwrap_or_else(|_| "detected-objects-lifecycle".to_string()),
                consumer_group: std::env::var("KAFKA_CONSUMER_GROUP")
                    .unwrap_or_else(|_| "tracklens-upload-workers".to_string()),
                ssl_enabled: std::env::var("KAFKA_SSL_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                sasl_mechanism: std::env::var("KAFKA_SASL_MECHANISM").ok(),
                sasl_username: std::env::var("KAFKA_SASL_USERNAME").ok(),
                sasl_password: std::env::var("KAFKA_SASL_PASSWORD").ok(),
                producer_timeout_ms: std::env::var("KAFKA_PRODUCER_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_PRODUCER_TIMEOUT_MS),
                poll_timeout_ms: std::env::var("KAFKA_POLL_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_POLL_TIMEOUT_MS),
            },
            annotation: AnnotationConfig {
                base_url: std::env::var("ANNOTATION_URL")?,
                username: std::env::var("ANNOTATION_USERNAME")?,
                password: std::env::var("ANNOTATION_PASSWORD")?,
                organization: std::env::var("ANNOTATION_ORGANIZATION").ok(),
                session_ttl_secs: std::env::var("ANNOTATION_SESSION_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SESSION_TTL_SECS),
                request_timeout_secs: std::env::var("ANNOTATION_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            },
            uploads: UploadsConfig {
                dashboard_url: std::env::var("DASHBOARD_URL")?,
                max_frames_per_task: {
                    let value = std::env::var("MAX_FRAMES_PER_TASK")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(DEFAULT_MAX_FRAMES_PER_TASK);
                    if value == 0 {
                        anyhow::bail!("MAX_FRAMES_PER_TASK must be at least 1");
                    }
                    value
                },
            },
            db: DbConfig {
                max_connections: std::env::var("DB_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                acquire_timeout_secs: std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(600),
            },
        })
    }
}
