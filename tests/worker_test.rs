// Worker loop tests: a scripted message source drives run_worker and
// every delivery must end in a commit, whatever happened to the message.


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use tracklens::dispatcher::{TaskDispatcher, TaskHandler};
use tracklens::kafka::InboundMessage;
use tracklens::uploads::{UploadOrchestrator, UploadStatus};
use tracklens::worker::run_worker;

use test_utils::{
    InMemoryUploadTaskStore, ScriptedAnnotationClient, ScriptedSource, inbound_message,
    upload_request_payload,
};

struct RecordingHandler {
    calls: AtomicUsize,
    fail: bool,
}

impl RecordingHandler {
    fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    async fn handle(&self, _parameters: Value, _message_key: Option<&str>) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("task exploded");
        }
        Ok(())
    }
}

async fn wait_for_commits(source: &ScriptedSource, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while source.committed_offsets().len() < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("worker did not commit the expected offsets in time");
}

#[tokio::test]
async fn processes_and_commits_each_message() {
    let handler = RecordingHandler::succeeding();
    let mut dispatcher = TaskDispatcher::new();
    dispatcher.register("cvat-upload", handler.clone()).unwrap();

    let source = Arc::new(ScriptedSource::new(vec![
        inbound_message(
            "cvat-upload",
            "u-1-0",
            upload_request_payload("u-1-0", 3, "u-1", &[1]),
            40,
        ),
        inbound_message(
            "cvat-upload",
            "u-2-0",
            upload_request_payload("u-2-0", 3, "u-2", &[2]),
            41,
        ),
    ]));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(source.clone(), dispatcher, shutdown_rx));

    wait_for_commits(&source, 2).await;
    shutdown_tx.send(true).unwrap();
    worker.await.unwrap().unwrap();

    assert_eq!(handler.calls(), 2);
    assert_eq!(source.committed_offsets(), vec![40, 41]);
}

#[tokio::test]
async fn handler_failure_still_commits() {
    let handler = RecordingHandler::failing();
    let mut dispatcher = TaskDispatcher::new();
    dispatcher.register("cvat-upload", handler.clone()).unwrap();

    let source = Arc::new(ScriptedSource::new(vec![inbound_message(
        "cvat-upload",
        "u-1-0",
        upload_request_payload("u-1-0", 3, "u-1", &[1]),
        7,
    )]));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(source.clone(), dispatcher, shutdown_rx));

    wait_for_commits(&source, 1).await;
    shutdown_tx.send(true).unwrap();
    worker.await.unwrap().unwrap();

    assert_eq!(handler.calls(), 1);
    assert_eq!(source.committed_offsets(), vec![7]);
}

#[tokio::test]
async fn undecodable_payload_is_discarded_but_committed() {
    let handler = RecordingHandler::succeeding();
    let mut dispatcher = TaskDispatcher::new();
    dispatcher.register("cvat-upload", handler.clone()).unwrap();

    let source = Arc::new(ScriptedSource::new(vec![InboundMessage {
        topic: "cvat-upload".to_string(),
        key: Some("u-1-0".to_string()),
        payload: b"not json{".to_vec(),
        partition: 0,
        offset: 12,
    }]));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(source.clone(), dispatcher, shutdown_rx));

    wait_for_commits(&source, 1).await;
    shutdown_tx.send(true).unwrap();
    worker.await.unwrap().unwrap();

    assert_eq!(handler.calls(), 0);
    assert_eq!(source.committed_offsets(), vec![12]);
}

#[tokio::test]
async fn message_for_unhandled_topic_is_discarded_but_committed() {
    let handler = RecordingHandler::succeeding();
    let mut dispatcher = TaskDispatcher::new();
    dispatcher.register("cvat-upload", handler.clone()).unwrap();

    let source = Arc::new(ScriptedSource::new(vec![inbound_message(
        "some-other-topic",
        "u-1-0",
        upload_request_payload("u-1-0", 3, "u-1", &[1]),
        3,
    )]));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(source.clone(), dispatcher, shutdown_rx));

    wait_for_commits(&source, 1).await;
    shutdown_tx.send(true).unwrap();
    worker.await.unwrap().unwrap();

    assert_eq!(handler.calls(), 0);
    assert_eq!(source.committed_offsets(), vec![3]);
}

#[tokio::test]
async fn shutdown_stops_an_idle_worker() {
    let dispatcher = TaskDispatcher::new();
    let source = Arc::new(ScriptedSource::new(vec![]));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(source, dispatcher, shutdown_rx));

    tokio::time::sleep(Duration::from_millis(30)).await;
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .expect("worker did not stop after shutdown signal")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn closed_shutdown_channel_stops_the_worker() {
    let dispatcher = TaskDispatcher::new();
    let source = Arc::new(ScriptedSource::new(vec![]));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(shutdown_tx);

    let worker = tokio::spawn(run_worker(source, dispatcher, shutdown_rx));

    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .expect("worker did not stop after the shutdown channel closed")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn upload_request_flows_from_message_to_completed_task() {
    let store = Arc::new(InMemoryUploadTaskStore::new());
    let client = Arc::new(ScriptedAnnotationClient::new());
    let orchestrator =
        UploadOrchestrator::new(store.clone(), client.clone(), "https://dash.example.com");

    let mut dispatcher = TaskDispatcher::new();
    dispatcher
        .register("cvat-upload", Arc::new(orchestrator))
        .unwrap();

    let source = Arc::new(ScriptedSource::new(vec![inbound_message(
        "cvat-upload",
        "u-9-0",
        upload_request_payload("u-9-0", 4, "u-9", &[21, 22]),
        88,
    )]));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(source.clone(), dispatcher, shutdown_rx));

    wait_for_commits(&source, 1).await;
    shutdown_tx.send(true).unwrap();
    worker.await.unwrap().unwrap();

    let task = store.task("u-9").unwrap();
    assert_eq!(task.status, UploadStatus::Completed);
    assert_eq!(task.external_task_id, Some(501));
    assert_eq!(source.committed_offsets(), vec![88]);
}
