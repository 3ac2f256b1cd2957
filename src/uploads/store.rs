use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::model::{UploadStatus, UploadTask};
use crate::error::StoreError;

/// Storage interface for upload tasks.
///
/// The interface is small on purpose: insert once, move the status
/// forward, read back by uuid. Tests substitute an in-memory
/// implementation.
#[async_trait]
pub trait UploadTaskStore: Send + Sync {
    /// Inserts a new task.
    ///
    /// `upload_uuid` is unique; inserting it twice fails with
    /// [`StoreError::DuplicateUpload`] and leaves the existing row
    /// untouched.
    async fn insert_task(&self, task: &UploadTask) -> Result<(), StoreError>;

    /// Moves a task to a new status.
    ///
    /// `external_task_id` overwrites the stored id when given and leaves
    /// it unchanged when `None`. Tasks already in a terminal status are
    /// never modified; such an update fails with
    /// [`StoreError::StaleTransition`].
    async fn update_task_status(
        &self,
        upload_uuid: &str,
        status: UploadStatus,
        external_task_id: Option<i64>,
    ) -> Result<(), StoreError>;

    /// Fetches a task by its upload uuid.
    async fn get_task(&self, upload_uuid: &str) -> Result<Option<UploadTask>, StoreError>;
}

/// PostgreSQL implementation of [`UploadTaskStore`].
pub struct PostgresUploadTaskStore {
    pool: PgPool,
}

impl PostgresUploadTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UploadTaskStore for PostgresUploadTaskStore {
    async fn insert_task(&self, task: &UploadTask) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO upload_tasks (upload_uuid, project_id, name, status, created)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (upload_uuid) DO NOTHING
            "#,
        )
        .bind(&task.upload_uuid)
        .bind(task.project_id)
        .bind(&task.name)
        .bind(task.status.as_str())
        .bind(task.created)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateUpload {
                upload_uuid: task.upload_uuid.clone(),
            });
        }

        Ok(())
    }

    async fn update_task_status(
        &self,
        upload_uuid: &str,
        status: UploadStatus,
        external_task_id: Option<i64>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE upload_tasks
            SET status = $2,
                external_task_id = COALESCE($3, external_task_id)
            WHERE upload_uuid = $1
              AND status NOT IN ('error', 'completed')
            "#,
        )
        .bind(upload_uuid)
        .bind(status.as_str())
        .bind(external_task_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StaleTransition {
                upload_uuid: upload_uuid.to_string(),
            });
        }

        Ok(())
    }

    async fn get_task(&self, upload_uuid: &str) -> Result<Option<UploadTask>, StoreError> {
        let row = sqlx::query_as::<_, (i64, DateTime<Utc>, String, i64, String, Option<i64>, String)>(
            r#"
            SELECT id, created, upload_uuid, project_id, name, external_task_id, status
            FROM upload_tasks
            WHERE upload_uuid = $1
            "#,
        )
        .bind(upload_uuid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(
            |(id, created, upload_uuid, project_id, name, external_task_id, status)| {
                Ok(UploadTask {
                    id,
                    created,
                    upload_uuid,
                    project_id,
                    name,
                    external_task_id,
                    status: UploadStatus::parse(&status)?,
                })
            },
        )
        .transpose()
    }
}
