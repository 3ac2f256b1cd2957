use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

use crate::error::{DuplicateHandlerError, UnknownTaskError};

/// An async task handler bound to one task name.
///
/// Handlers receive the decoded message body and the message key. The key
/// is only used for log correlation; handlers must take everything they
/// act on from the parameters.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, parameters: Value, message_key: Option<&str>) -> anyhow::Result<()>;
}

/// What happened to a dispatched message.
///
/// `Failed` means the handler ran and returned an error. The error is
/// already logged by the dispatcher; the caller decides only whether to
/// commit, and failed messages are committed like completed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Failed,
}

/// Maps task names to their handlers.
///
/// The registry is assembled once at startup and read-only afterwards,
/// so dispatch needs no locking.
#[derive(Default)]
pub struct TaskDispatcher {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under a task name.
    ///
    /// Names are bound exactly once; a second registration under the same
    /// name is a wiring bug and is rejected.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), DuplicateHandlerError> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(DuplicateHandlerError { name });
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Runs the handler registered under `name`.
    ///
    /// A handler error is caught and logged together with the message key,
    /// then reported as [`DispatchOutcome::Failed`]. Only an unregistered
    /// name is an error of the dispatcher itself.
    pub async fn dispatch(
        &self,
        name: &str,
        parameters: Value,
        message_key: Option<&str>,
    ) -> Result<DispatchOutcome, UnknownTaskError> {
        let handler = self.handlers.get(name).ok_or_else(|| UnknownTaskError {
            name: name.to_string(),
        })?;

        match handler.handle(parameters, message_key).await {
            Ok(()) => Ok(DispatchOutcome::Completed),
            Err(err) => {
                error!(
                    task = name,
                    message_key = message_key.unwrap_or("<none>"),
                    error = format!("{err:#}"),
                    "Task handler failed"
                );
                Ok(DispatchOutcome::Failed)
            }
        }
    }

    pub fn registered_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
