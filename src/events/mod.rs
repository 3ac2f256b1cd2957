// Event types and the wire codec shared by producers and consumers.

pub mod codec;
pub mod lifecycle;
pub mod types;

pub use lifecycle::ObjectsLifecycle;
pub use types::{ClusterizationResult, Event, EventType};
