// Annotation service (CVAT) integration: a TTL-bound session and the
// HTTP client for task creation and frame attachment.

pub mod client;
pub mod session;

pub use client::{AnnotationClient, HttpAnnotationClient};
pub use session::ExpiringSession;
