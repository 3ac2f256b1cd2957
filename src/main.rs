use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tracklens::annotation::HttpAnnotationClient;
use tracklens::config::Config;
use tracklens::dispatcher::TaskDispatcher;
use tracklens::kafka::{EventConsumer, EventPublisher};
use tracklens::uploads::{PostgresUploadTaskStore, UploadOrchestrator, UploadRequestPublisher};
use tracklens::{db, http, worker};

/// Entry points of the binary.
enum Command {
    /// Consume upload requests and drive them through the annotation service.
    UploadWorker,
    /// Queue upload requests for a frame selection and exit.
    RequestUpload {
        project_id: i64,
        frame_ids: Vec<i64>,
    },
}

impl Command {
    fn from_args() -> Result<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        match args.first().map(String::as_str) {
            Some("upload-worker") => Ok(Command::UploadWorker),
            Some("request-upload") => {
                if args.len() < 3 {
                    bail!("usage: tracklens request-upload <project_id> <frame_id>...");
                }
                let project_id = args[1]
                    .parse()
                    .with_context(|| format!("invalid project id: {}", args[1]))?;
                let frame_ids = args[2..]
                    .iter()
                    .map(|raw| {
                        raw.parse()
                            .with_context(|| format!("invalid frame id: {raw}"))
                    })
                    .collect::<Result<Vec<i64>>>()?;
                Ok(Command::RequestUpload {
                    project_id,
                    frame_ids,
                })
            }
            Some(other) => bail!("unknown command: {other} (expected upload-worker or request-upload)"),
            None => bail!("usage: tracklens <upload-worker|request-upload>"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let command = Command::from_args()?;

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match command {
        Command::UploadWorker => run_upload_worker(config).await,
        Command::RequestUpload {
            project_id,
            frame_ids,
        } => run_request_upload(config, project_id, frame_ids).await,
    }
}

/// Wires the upload worker and runs it until a shutdown signal arrives.
async fn run_upload_worker(config: Config) -> Result<()> {
    let db_pool = db::create_pool(&config.database_url, &config.db)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .context("Failed to apply database migrations")?;
    info!("Database migrations applied");

    let store = Arc::new(PostgresUploadTaskStore::new(db_pool.clone()));
    let annotation = Arc::new(
        HttpAnnotationClient::new(&config.annotation)
            .context("Failed to create annotation service client")?,
    );
    let orchestrator = UploadOrchestrator::new(
        store,
        annotation,
        config.uploads.dashboard_url.clone(),
    );

    let mut dispatcher = TaskDispatcher::new();
    dispatcher.register(&config.kafka.upload_topic, Arc::new(orchestrator))?;

    let consumer = EventConsumer::new(&config.kafka, &[config.kafka.upload_topic.as_str()])?;

    info!("Upload worker started");
    info!("Brokers: {}", config.kafka.brokers);
    info!("Topic: {}", config.kafka.upload_topic);
    info!("Consumer group: {}", config.kafka.consumer_group);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
                        _ = tokio::signal::ctrl_c() => info!("SIGINT received, shutting down"),
                    }
                }
                Err(e) => {
                    error!("Failed to register SIGTERM handler: {}", e);
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => info!("SIGINT received, shutting down"),
                        Err(e) => {
                            error!("Failed to listen for shutdown signal: {}", e);
                            return;
                        }
                    }
                }
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Ctrl-C received, shutting down");
        }
        let _ = shutdown_tx.send(true);
    });

    let health_port = config.health_port;
    let http_pool = db_pool.clone();
    tokio::spawn(async move {
        if let Err(e) = http::run_http_server(health_port, http_pool).await {
            error!("HTTP server failed: {}", e);
        }
    });

    worker::run_worker(Arc::new(consumer), dispatcher, shutdown_rx).await
}

/// Splits a frame selection into upload tasks and queues them.
async fn run_request_upload(config: Config, project_id: i64, frame_ids: Vec<i64>) -> Result<()> {
    let publisher = Arc::new(EventPublisher::new(config.kafka.clone()));
    let requests = UploadRequestPublisher::new(
        publisher,
        config.kafka.upload_topic.clone(),
        config.uploads.max_frames_per_task,
    );

    let uuids = requests
        .publish_upload_requests(project_id, &frame_ids)
        .await?;
    info!(
        project_id,
        frames = frame_ids.len(),
        tasks = uuids.len(),
        "Upload requests queued"
    );

    Ok(())
}
