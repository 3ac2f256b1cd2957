use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, TextEncoder, opts, register_int_counter};

pub static UPLOAD_TASKS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "tracklens_upload_tasks_completed_total",
        "Total number of upload tasks that reached the completed status"
    ))
    .unwrap()
});

pub static UPLOAD_TASKS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "tracklens_upload_tasks_failed_total",
        "Total number of upload tasks that ended in the error status"
    ))
    .unwrap()
});

pub static UPLOAD_TASKS_DUPLICATE: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "tracklens_upload_tasks_duplicate_total",
        "Total number of upload requests skipped because the upload uuid was already recorded"
    ))
    .unwrap()
});

pub static HANDLER_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "tracklens_handler_failures_total",
        "Total number of task handler runs that returned an error"
    ))
    .unwrap()
});

pub static DISCARDED_MESSAGES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "tracklens_discarded_messages_total",
        "Total number of messages dropped without running a handler"
    ))
    .unwrap()
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
