use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodingError, StoreError};

/// Lifecycle status of an upload task.
///
/// Transitions only move forward: `pending` to `processing` to either
/// `completed` or `error`. The two terminal statuses are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Processing,
    Error,
    Completed,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Processing => "processing",
            UploadStatus::Error => "error",
            UploadStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StoreError> {
        match value {
            "pending" => Ok(UploadStatus::Pending),
            "processing" => Ok(UploadStatus::Processing),
            "error" => Ok(UploadStatus::Error),
            "completed" => Ok(UploadStatus::Completed),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Error | UploadStatus::Completed)
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted upload task.
///
/// `upload_uuid` is unique across all tasks and is the idempotency key
/// for upload request processing. `external_task_id` is the id assigned
/// by the annotation service, recorded once task creation succeeds there.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    /// Assigned by the store; zero until the task is inserted.
    pub id: i64,
    pub created: DateTime<Utc>,
    pub upload_uuid: String,
    pub project_id: i64,
    pub name: String,
    pub external_task_id: Option<i64>,
    pub status: UploadStatus,
}

impl UploadTask {
    /// A new pending task for an upload request, ready to insert.
    pub fn pending(request: &UploadRequest) -> Self {
        Self {
            id: 0,
            created: Utc::now(),
            upload_uuid: request.upload_uuid.clone(),
            project_id: request.project_id,
            name: request.task_name.clone(),
            external_task_id: None,
            status: UploadStatus::Pending,
        }
    }
}

/// Body of an upload request message.
///
/// Decoding is strict: all four fields are required and unknown fields
/// reject the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadRequest {
    pub task_name: String,
    pub project_id: i64,
    pub upload_uuid: String,
    pub frame_ids: Vec<i64>,
}

impl UploadRequest {
    /// Parses the decoded message body of an upload request task.
    pub fn from_task_parameters(parameters: Value) -> Result<Self, DecodingError> {
        let rendered = parameters.to_string();
        serde_json::from_value(parameters)
            .map_err(|source| DecodingError::new(source, rendered.as_bytes()))
    }
}
