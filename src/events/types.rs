use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle stage of a detected object or frame.
///
/// Wire names are the lowercase snake_case of the variant, so a payload
/// produced by any other component of the dashboard decodes unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
    ProResend,
    ModerationSaved,
}

/// A single lifecycle event.
///
/// Instances are treated as immutable: the fields are set at construction
/// and only read afterwards. `payload` carries optional extra attributes
/// and is omitted from the wire when empty.
///
/// Decoding is strict: `event_type` and `object_id` are required and any
/// unknown field rejects the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Event {
    event_type: EventType,
    object_id: i64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    payload: Map<String, Value>,
}

impl Event {
    pub fn new(event_type: EventType, object_id: i64) -> Self {
        Self {
            event_type,
            object_id,
            payload: Map::new(),
        }
    }

    pub fn with_payload(event_type: EventType, object_id: i64, payload: Map<String, Value>) -> Self {
        Self {
            event_type,
            object_id,
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn object_id(&self) -> i64 {
        self.object_id
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

/// Outcome of one clusterization pass over detected objects.
///
/// Merged objects disappear, surviving cluster heads change and brand new
/// clusters appear, so downstream consumers need all three id sets.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClusterizationResult {
    pub created_ids: Vec<i64>,
    pub updated_ids: Vec<i64>,
    pub deleted_ids: Vec<i64>,
}
