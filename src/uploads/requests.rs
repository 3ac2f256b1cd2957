use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::model::UploadRequest;
use crate::error::{EncodingError, PublishError};
use crate::kafka::MessageSink;

/// Splits a frame selection into per-task upload requests.
///
/// The annotation service slows down badly on oversized tasks, so the
/// selection is chunked at `max_frames_per_task`. Every chunk gets its
/// own `upload_uuid`; the task name carries the chunk index for operators
/// reading the annotation service UI.
pub fn build_upload_requests(
    project_id: i64,
    frame_ids: &[i64],
    max_frames_per_task: usize,
) -> Vec<UploadRequest> {
    frame_ids
        .chunks(max_frames_per_task)
        .enumerate()
        .map(|(batch_num, chunk)| {
            let upload_uuid = Uuid::new_v4().to_string();
            UploadRequest {
                task_name: format!("{upload_uuid}-{batch_num}"),
                project_id,
                upload_uuid,
                frame_ids: chunk.to_vec(),
            }
        })
        .collect()
}

/// Queues upload requests for asynchronous processing by the worker.
pub struct UploadRequestPublisher {
    sink: Arc<dyn MessageSink>,
    topic: String,
    max_frames_per_task: usize,
}

impl UploadRequestPublisher {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        topic: impl Into<String>,
        max_frames_per_task: usize,
    ) -> Self {
        Self {
            sink,
            topic: topic.into(),
            max_frames_per_task,
        }
    }

    /// Publishes one upload request per frame chunk, keyed by task name.
    ///
    /// Returns the upload uuids in publish order. An empty selection
    /// publishes nothing.
    pub async fn publish_upload_requests(
        &self,
        project_id: i64,
        frame_ids: &[i64],
    ) -> Result<Vec<String>, PublishError> {
        let requests = build_upload_requests(project_id, frame_ids, self.max_frames_per_task);

        let mut uuids = Vec::with_capacity(requests.len());
        for request in &requests {
            let payload = serde_json::to_vec(request).map_err(EncodingError::from)?;
            self.sink
                .publish_raw(&self.topic, &payload, &request.task_name)
                .await?;

            info!(
                upload_uuid = %request.upload_uuid,
                task_name = %request.task_name,
                frames = request.frame_ids.len(),
                "Upload request queued"
            );

            uuids.push(request.upload_uuid.clone());
        }

        Ok(uuids)
    }
}
