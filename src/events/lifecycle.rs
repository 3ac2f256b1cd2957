use std::sync::Arc;

use crate::error::PublishError;
use crate::events::codec;
use crate::events::types::{ClusterizationResult, Event, EventType};
use crate::kafka::MessageSink;

/// Publishes detected object lifecycle events.
///
/// Every event is keyed by the object id so all events for one object land
/// in the same partition and replay in order.
pub struct ObjectsLifecycle {
    sink: Arc<dyn MessageSink>,
    topic: String,
}

impl ObjectsLifecycle {
    pub fn new(sink: Arc<dyn MessageSink>, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
        }
    }

    pub async fn produce_created_event(&self, object_id: i64) -> Result<(), PublishError> {
        self.produce(EventType::Created, object_id).await
    }

    pub async fn produce_updated_event(&self, object_id: i64) -> Result<(), PublishError> {
        self.produce(EventType::Updated, object_id).await
    }

    pub async fn produce_deleted_event(&self, object_id: i64) -> Result<(), PublishError> {
        self.produce(EventType::Deleted, object_id).await
    }

    pub async fn produce_pro_resend_event(&self, object_id: i64) -> Result<(), PublishError> {
        self.produce(EventType::ProResend, object_id).await
    }

    pub async fn produce_moderation_saved_event(&self, object_id: i64) -> Result<(), PublishError> {
        self.produce(EventType::ModerationSaved, object_id).await
    }

    /// Publishes the full set of events for one clusterization pass.
    ///
    /// Deletions go out first so a consumer never sees an update for an
    /// object it still believes is merged away.
    pub async fn publish_clusterization_result(
        &self,
        result: &ClusterizationResult,
    ) -> Result<(), PublishError> {
        for object_id in &result.deleted_ids {
            self.produce_deleted_event(*object_id).await?;
        }
        for object_id in &result.updated_ids {
            self.produce_updated_event(*object_id).await?;
        }
        for object_id in &result.created_ids {
            self.produce_created_event(*object_id).await?;
        }
        Ok(())
    }

    async fn produce(&self, event_type: EventType, object_id: i64) -> Result<(), PublishError> {
        let event = Event::new(event_type, object_id);
        let payload = codec::encode(&event)?;
        self.sink
            .publish_raw(&self.topic, &payload, &object_id.to_string())
            .await?;
        Ok(())
    }
}
