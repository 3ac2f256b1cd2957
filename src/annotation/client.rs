use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::session::ExpiringSession;
use crate::config::AnnotationConfig;
use crate::error::ExternalServiceError;

/// Client interface to the annotation service.
///
/// Only the two calls the upload pipeline needs. Tests substitute a
/// scripted implementation.
#[async_trait]
pub trait AnnotationClient: Send + Sync {
    /// Creates an annotation task inside a project and returns the id the
    /// service assigned to it.
    async fn create_task(&self, name: &str, project_id: i64) -> Result<i64, ExternalServiceError>;

    /// Attaches remote frame images to an existing task.
    async fn attach_frames(
        &self,
        task_id: i64,
        frame_urls: &[String],
    ) -> Result<(), ExternalServiceError>;
}

#[derive(Serialize)]
struct TaskWriteRequest<'a> {
    name: &'a str,
    project_id: i64,
}

#[derive(Deserialize)]
struct CreatedTaskResponse {
    id: i64,
}

#[derive(Serialize)]
struct AttachFramesRequest<'a> {
    remote_files: &'a [String],
    image_quality: u8,
}

/// HTTP implementation of [`AnnotationClient`] against the CVAT REST API.
///
/// Requests authenticate with a token from the shared [`ExpiringSession`]
/// and carry the organization slug when one is configured.
pub struct HttpAnnotationClient {
    http: reqwest::Client,
    base_url: String,
    organization: Option<String>,
    session: ExpiringSession,
}

impl HttpAnnotationClient {
    const IMAGE_QUALITY: u8 = 70;

    pub fn new(config: &AnnotationConfig) -> Result<Self, ExternalServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            organization: config.organization.clone(),
            session: ExpiringSession::new(config),
        })
    }

    async fn post_json<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        operation: &'static str,
    ) -> Result<reqwest::Response, ExternalServiceError> {
        let token = self.session.token(&self.http).await?;

        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, format!("Token {token}"))
            .json(body);
        if let Some(organization) = &self.organization {
            request = request.header("X-Organization", organization);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ExternalServiceError::Status {
                operation,
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl AnnotationClient for HttpAnnotationClient {
    async fn create_task(&self, name: &str, project_id: i64) -> Result<i64, ExternalServiceError> {
        let response = self
            .post_json(
                "/api/tasks",
                &TaskWriteRequest { name, project_id },
                "create_task",
            )
            .await?;

        let created: CreatedTaskResponse = response.json().await?;

        debug!(
            task_name = name,
            project_id = project_id,
            task_id = created.id,
            "Created annotation task"
        );

        Ok(created.id)
    }

    async fn attach_frames(
        &self,
        task_id: i64,
        frame_urls: &[String],
    ) -> Result<(), ExternalServiceError> {
        self.post_json(
            &format!("/api/tasks/{task_id}/data"),
            &AttachFramesRequest {
                remote_files: frame_urls,
                image_quality: Self::IMAGE_QUALITY,
            },
            "attach_frames",
        )
        .await?;

        debug!(
            task_id = task_id,
            frames = frame_urls.len(),
            "Attached frames to annotation task"
        );

        Ok(())
    }
}
