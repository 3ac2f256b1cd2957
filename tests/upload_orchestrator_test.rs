// Upload orchestrator tests: drive the full task lifecycle against
// in-memory collaborators, including the failure and redelivery paths.


use std::sync::Arc;

use serde_json::json;

use tracklens::dispatcher::TaskHandler;
use tracklens::error::{StoreError, UploadError};
use tracklens::uploads::{
    UploadOrchestrator, UploadRequest, UploadStatus, UploadTask, UploadTaskStore,
};

use test_utils::{InMemoryUploadTaskStore, ScriptedAnnotationClient, upload_request_payload};

fn request() -> UploadRequest {
    UploadRequest {
        task_name: "u-100-0".to_string(),
        project_id: 7,
        upload_uuid: "u-100".to_string(),
        frame_ids: vec![11, 12],
    }
}

#[tokio::test]
async fn upload_runs_to_completed_and_records_external_id() {
    let store = Arc::new(InMemoryUploadTaskStore::new());
    let client = Arc::new(ScriptedAnnotationClient::new());
    let orchestrator =
        UploadOrchestrator::new(store.clone(), client.clone(), "https://dash.example.com");

    orchestrator
        .handle_upload_requested(&request())
        .await
        .unwrap();

    let task = store.task("u-100").unwrap();
    assert_eq!(task.status, UploadStatus::Completed);
    assert_eq!(task.external_task_id, Some(501));
    assert_eq!(task.project_id, 7);
    assert_eq!(task.name, "u-100-0");

    assert_eq!(
        *client.created.lock().unwrap(),
        vec![("u-100-0".to_string(), 7)]
    );
    let attached = client.attached.lock().unwrap();
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].0, 501);
    assert_eq!(
        attached[0].1,
        vec![
            "https://dash.example.com/frames/11.jpg".to_string(),
            "https://dash.example.com/frames/12.jpg".to_string(),
        ]
    );
}

#[tokio::test]
async fn redelivered_request_leaves_the_completed_row_alone() {
    let store = Arc::new(InMemoryUploadTaskStore::new());
    let client = Arc::new(ScriptedAnnotationClient::new());
    let orchestrator =
        UploadOrchestrator::new(store.clone(), client.clone(), "https://dash.example.com");

    orchestrator
        .handle_upload_requested(&request())
        .await
        .unwrap();
    let first = store.task("u-100").unwrap();

    let second = orchestrator.handle_upload_requested(&request()).await;

    assert!(matches!(
        second,
        Err(UploadError::Duplicate { upload_uuid }) if upload_uuid == "u-100"
    ));
    assert_eq!(store.task("u-100").unwrap(), first);
    // The annotation service was not called again.
    assert_eq!(client.created.lock().unwrap().len(), 1);
    assert_eq!(client.attached.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn create_failure_parks_the_task_in_error() {
    let store = Arc::new(InMemoryUploadTaskStore::new());
    let client = Arc::new(ScriptedAnnotationClient::failing_create());
    let orchestrator =
        UploadOrchestrator::new(store.clone(), client.clone(), "https://dash.example.com");

    let result = orchestrator.handle_upload_requested(&request()).await;

    assert!(matches!(result, Err(UploadError::External(_))));
    let task = store.task("u-100").unwrap();
    assert_eq!(task.status, UploadStatus::Error);
    assert_eq!(task.external_task_id, None);
    assert!(client.attached.lock().unwrap().is_empty());
}

#[tokio::test]
async fn attach_failure_parks_the_task_in_error_keeping_external_id() {
    let store = Arc::new(InMemoryUploadTaskStore::new());
    let client = Arc::new(ScriptedAnnotationClient::failing_attach());
    let orchestrator =
        UploadOrchestrator::new(store.clone(), client.clone(), "https://dash.example.com");

    let result = orchestrator.handle_upload_requested(&request()).await;

    assert!(matches!(result, Err(UploadError::External(_))));
    let task = store.task("u-100").unwrap();
    assert_eq!(task.status, UploadStatus::Error);
    // The annotation task was created before the attach failed.
    assert_eq!(task.external_task_id, Some(501));
}

#[tokio::test]
async fn handler_absorbs_duplicate_requests() {
    let store = Arc::new(InMemoryUploadTaskStore::new());
    let client = Arc::new(ScriptedAnnotationClient::new());
    let orchestrator =
        UploadOrchestrator::new(store.clone(), client.clone(), "https://dash.example.com");

    orchestrator
        .handle_upload_requested(&request())
        .await
        .unwrap();

    let parameters = upload_request_payload("u-100-0", 7, "u-100", &[11, 12]);
    let redelivery = orchestrator.handle(parameters, Some("u-100-0")).await;

    assert!(redelivery.is_ok());
    assert_eq!(store.task("u-100").unwrap().status, UploadStatus::Completed);
}

#[tokio::test]
async fn handler_propagates_processing_failures() {
    let store = Arc::new(InMemoryUploadTaskStore::new());
    let client = Arc::new(ScriptedAnnotationClient::failing_create());
    let orchestrator =
        UploadOrchestrator::new(store.clone(), client.clone(), "https://dash.example.com");

    let parameters = upload_request_payload("u-100-0", 7, "u-100", &[11, 12]);
    let result = orchestrator.handle(parameters, Some("u-100-0")).await;

    assert!(result.is_err());
    assert_eq!(store.task("u-100").unwrap().status, UploadStatus::Error);
}

#[tokio::test]
async fn store_refuses_to_leave_a_terminal_status() {
    let store = InMemoryUploadTaskStore::new();
    store
        .insert_task(&UploadTask::pending(&request()))
        .await
        .unwrap();
    store
        .update_task_status("u-100", UploadStatus::Completed, Some(501))
        .await
        .unwrap();

    let result = store
        .update_task_status("u-100", UploadStatus::Processing, None)
        .await;

    assert!(matches!(result, Err(StoreError::StaleTransition { .. })));
    assert_eq!(store.task("u-100").unwrap().status, UploadStatus::Completed);
    assert_eq!(store.task("u-100").unwrap().external_task_id, Some(501));
}

#[tokio::test]
async fn handler_rejects_malformed_parameters() {
    let store = Arc::new(InMemoryUploadTaskStore::new());
    let client = Arc::new(ScriptedAnnotationClient::new());
    let orchestrator =
        UploadOrchestrator::new(store.clone(), client.clone(), "https://dash.example.com");

    let parameters = json!({"task_name": "u-100-0", "project_id": "seven"});
    let result = orchestrator.handle(parameters, None).await;

    assert!(result.is_err());
    // Nothing was persisted for the unparseable request.
    assert!(store.task("u-100").is_none());
}
