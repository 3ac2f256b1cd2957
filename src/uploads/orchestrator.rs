use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use super::model::{UploadRequest, UploadStatus, UploadTask};
use super::store::UploadTaskStore;
use crate::annotation::AnnotationClient;
use crate::dispatcher::TaskHandler;
use crate::error::UploadError;
use crate::metrics;

/// Drives one upload request through its full lifecycle.
///
/// For each request the orchestrator records a pending task, creates the
/// matching task in the annotation service, attaches the frame images and
/// finishes the task as `completed`. Any failure on the way parks the
/// task in the terminal `error` status.
///
/// The `upload_uuid` insert is the idempotency barrier: a redelivered
/// request finds the row already present and stops before any annotation
/// service call is made.
pub struct UploadOrchestrator {
    store: Arc<dyn UploadTaskStore>,
    annotation: Arc<dyn AnnotationClient>,
    dashboard_url: String,
}

impl UploadOrchestrator {
    pub fn new(
        store: Arc<dyn UploadTaskStore>,
        annotation: Arc<dyn AnnotationClient>,
        dashboard_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            annotation,
            dashboard_url: dashboard_url.into(),
        }
    }

    /// Processes one upload request end to end.
    ///
    /// Status flow: `pending` on insert, `processing` once the annotation
    /// service accepted the task (recording its id), then `completed`, or
    /// `error` after any annotation service failure.
    pub async fn handle_upload_requested(&self, request: &UploadRequest) -> Result<(), UploadError> {
        info!(
            upload_uuid = %request.upload_uuid,
            task_name = %request.task_name,
            project_id = request.project_id,
            frames = request.frame_ids.len(),
            "Processing upload request"
        );

        let task = UploadTask::pending(request);
        self.store.insert_task(&task).await?;

        let external_task_id = match self
            .annotation
            .create_task(&request.task_name, request.project_id)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                error!(
                    upload_uuid = %request.upload_uuid,
                    error = %err,
                    "Failed to create annotation task"
                );
                self.mark_error(&request.upload_uuid).await;
                metrics::UPLOAD_TASKS_FAILED.inc();
                return Err(err.into());
            }
        };

        self.store
            .update_task_status(
                &request.upload_uuid,
                UploadStatus::Processing,
                Some(external_task_id),
            )
            .await?;

        let frame_urls = self.frame_urls(&request.frame_ids);
        if let Err(err) = self.annotation.attach_frames(external_task_id, &frame_urls).await {
            error!(
                upload_uuid = %request.upload_uuid,
                external_task_id = external_task_id,
                error = %err,
                "Failed to attach frames to annotation task"
            );
            self.mark_error(&request.upload_uuid).await;
            metrics::UPLOAD_TASKS_FAILED.inc();
            return Err(err.into());
        }

        self.store
            .update_task_status(&request.upload_uuid, UploadStatus::Completed, None)
            .await?;
        metrics::UPLOAD_TASKS_COMPLETED.inc();

        info!(
            upload_uuid = %request.upload_uuid,
            external_task_id = external_task_id,
            "Upload task completed"
        );

        Ok(())
    }

    /// Parks the task in the terminal `error` status.
    ///
    /// A store failure here is logged but not propagated so it cannot
    /// mask the annotation service error that got us here.
    async fn mark_error(&self, upload_uuid: &str) {
        if let Err(err) = self
            .store
            .update_task_status(upload_uuid, UploadStatus::Error, None)
            .await
        {
            error!(
                upload_uuid = upload_uuid,
                error = %err,
                "Failed to mark upload task as error"
            );
        }
    }

    /// Publicly reachable image URLs for the requested frames, served by
    /// the dashboard itself.
    fn frame_urls(&self, frame_ids: &[i64]) -> Vec<String> {
        let base = self.dashboard_url.trim_end_matches('/');
        frame_ids
            .iter()
            .map(|frame_id| format!("{base}/frames/{frame_id}.jpg"))
            .collect()
    }
}

#[async_trait]
impl TaskHandler for UploadOrchestrator {
    async fn handle(&self, parameters: Value, message_key: Option<&str>) -> anyhow::Result<()> {
        let request = UploadRequest::from_task_parameters(parameters)?;

        match self.handle_upload_requested(&request).await {
            // A redelivered request is expected under at-least-once
            // consumption, not a processing failure.
            Err(UploadError::Duplicate { upload_uuid }) => {
                metrics::UPLOAD_TASKS_DUPLICATE.inc();
                info!(
                    upload_uuid = %upload_uuid,
                    message_key = message_key.unwrap_or("<none>"),
                    "Upload request already processed, skipping"
                );
                Ok(())
            }
            other => Ok(other?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExternalServiceError;

    struct NoopStore;

    #[async_trait]
    impl UploadTaskStore for NoopStore {
        async fn insert_task(&self, _task: &UploadTask) -> Result<(), crate::error::StoreError> {
            Ok(())
        }

        async fn update_task_status(
            &self,
            _upload_uuid: &str,
            _status: UploadStatus,
            _external_task_id: Option<i64>,
        ) -> Result<(), crate::error::StoreError> {
            Ok(())
        }

        async fn get_task(
            &self,
            _upload_uuid: &str,
        ) -> Result<Option<UploadTask>, crate::error::StoreError> {
            Ok(None)
        }
    }

    struct NoopClient;

    #[async_trait]
    impl AnnotationClient for NoopClient {
        async fn create_task(
            &self,
            _name: &str,
            _project_id: i64,
        ) -> Result<i64, ExternalServiceError> {
            Ok(1)
        }

        async fn attach_frames(
            &self,
            _task_id: i64,
            _frame_urls: &[String],
        ) -> Result<(), ExternalServiceError> {
            Ok(())
        }
    }

    fn orchestrator(dashboard_url: &str) -> UploadOrchestrator {
        UploadOrchestrator::new(Arc::new(NoopStore), Arc::new(NoopClient), dashboard_url)
    }

    #[test]
    fn frame_urls_point_at_dashboard_jpgs() {
        let urls = orchestrator("https://signs.example.com").frame_urls(&[3, 17]);

        assert_eq!(
            urls,
            vec![
                "https://signs.example.com/frames/3.jpg",
                "https://signs.example.com/frames/17.jpg",
            ]
        );
    }

    #[test]
    fn frame_urls_tolerate_trailing_slash() {
        let urls = orchestrator("https://signs.example.com/").frame_urls(&[5]);

        assert_eq!(urls, vec!["https://signs.example.com/frames/5.jpg"]);
    }
}
