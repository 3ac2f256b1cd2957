use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{DispatchOutcome, TaskDispatcher};
use crate::error::DecodingError;
use crate::kafka::metrics as kafka_metrics;
use crate::kafka::{InboundMessage, MessageSource};
use crate::metrics;

const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What happened to one inbound message.
///
/// Every variant ends in a commit. `Discarded` covers messages that never
/// reached a handler: undecodable payloads and topics without a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    Completed,
    Failed,
    Discarded,
}

/// Decodes one message and dispatches it to the handler registered under
/// the message's topic.
///
/// Failures never propagate: a payload that does not decode or a handler
/// that errors is logged (with the message key for correlation) and
/// reported in the result, so the caller can commit either way. Retrying
/// a message that just failed would fail it again; redelivery is reserved
/// for crashes.
pub async fn process_message(
    dispatcher: &TaskDispatcher,
    message: &InboundMessage,
) -> ProcessResult {
    let message_key = message.key.as_deref();

    let parameters: Value = match serde_json::from_slice(&message.payload) {
        Ok(parameters) => parameters,
        Err(source) => {
            let err = DecodingError::new(source, &message.payload);
            warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                message_key = message_key.unwrap_or("<none>"),
                error = %err,
                "Discarding undecodable message"
            );
            return ProcessResult::Discarded;
        }
    };

    match dispatcher.dispatch(&message.topic, parameters, message_key).await {
        Ok(DispatchOutcome::Completed) => ProcessResult::Completed,
        Ok(DispatchOutcome::Failed) => ProcessResult::Failed,
        Err(err) => {
            error!(
                topic = %message.topic,
                message_key = message_key.unwrap_or("<none>"),
                error = %err,
                "Discarding message for topic without a handler"
            );
            ProcessResult::Discarded
        }
    }
}

/// Runs the consume loop until shutdown is signalled.
///
/// Each message is processed exactly once per delivery and its offset is
/// committed afterwards regardless of the processing result, so a broken
/// message cannot wedge the partition. The shutdown signal is only
/// honored between messages: a message being processed is finished and
/// committed first.
pub async fn run_worker(
    source: Arc<dyn MessageSource>,
    dispatcher: TaskDispatcher,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(
        tasks = ?dispatcher.registered_names().collect::<Vec<_>>(),
        "Worker started"
    );

    loop {
        let message = tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_ok() {
                    info!("Shutdown signal received, stopping message fetch");
                } else {
                    warn!("Shutdown channel closed, stopping message fetch");
                }
                break;
            }

            polled = source.poll() => match polled {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(err) => {
                    kafka_metrics::CONSUME_FAILURE.inc();
                    error!(error = %err, "Failed to fetch message from broker");
                    tokio::time::sleep(FETCH_RETRY_DELAY).await;
                    continue;
                }
            }
        };

        match process_message(&dispatcher, &message).await {
            ProcessResult::Completed => {
                kafka_metrics::CONSUME_SUCCESS.inc();
                debug!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Message processed"
                );
            }
            ProcessResult::Failed => {
                metrics::HANDLER_FAILURES.inc();
            }
            ProcessResult::Discarded => {
                metrics::DISCARDED_MESSAGES.inc();
            }
        }

        // Commit even after a failure. A commit error is not retried
        // either; the message may be redelivered, which at-least-once
        // processing already tolerates.
        if let Err(err) = source.commit(&message) {
            error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %err,
                "Failed to commit offset, message may be redelivered"
            );
        }
    }

    info!("Worker stopped");
    Ok(())
}
