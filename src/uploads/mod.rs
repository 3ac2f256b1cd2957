// Upload task lifecycle: requesting annotation uploads, persisting task
// state and orchestrating the annotation service calls.

pub mod model;
pub mod orchestrator;
pub mod requests;
pub mod store;

pub use model::{UploadRequest, UploadStatus, UploadTask};
pub use orchestrator::UploadOrchestrator;
pub use requests::UploadRequestPublisher;
pub use store::{PostgresUploadTaskStore, UploadTaskStore};
