use std::any::Any;

use crate::models::JobFailure;

/// Receives failures of jobs that panicked on a worker thread.
pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: &JobFailure);
}

/// Default reporter writing failures to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn report(&self, failure: &JobFailure) {
        log::error!("Job failed {}", failure);
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
