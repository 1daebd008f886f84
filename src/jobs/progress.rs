//! Progress event payload and channel. No UI shell is wired into this crate, so progress
//! travels over a plain `mpsc` channel instead of a GUI event-bus callback. A CLI or future
//! UI consumes `EventSource` however it likes -- print it, forward it, ignore it.

use std::sync::mpsc;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: String,
    pub phase: String,
    pub current: u64,
    pub total: u64,
    pub percent: f64,
    pub message: String,
    pub is_cancelled: bool,
    pub is_error: bool,
    pub error_message: Option<String>,
}

impl JobProgress {
    pub fn new(job_id: impl Into<String>, phase: impl Into<String>, current: u64, total: u64) -> Self {
        let total_safe = total.max(1);
        let percent = (current as f64 / total_safe as f64 * 100.0).min(100.0);
        Self {
            job_id: job_id.into(),
            phase: phase.into(),
            current,
            total,
            percent,
            message: String::new(),
            is_cancelled: false,
            is_error: false,
            error_message: None,
        }
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = msg.into();
        self
    }

    pub fn cancelled(mut self) -> Self {
        self.is_cancelled = true;
        self
    }

    pub fn error(mut self, msg: impl Into<String>) -> Self {
        self.is_error = true;
        self.error_message = Some(msg.into());
        self
    }
}

pub type EventSink = mpsc::Sender<JobProgress>;
pub type EventSource = mpsc::Receiver<JobProgress>;

pub fn channel() -> (EventSink, EventSource) {
    mpsc::channel()
}

/// Sends, swallowing the error a disconnected receiver would raise -- a dropped UI or CLI
/// listener should never fail the job it was merely observing.
pub fn emit(sink: &EventSink, progress: JobProgress) {
    let _ = sink.send(progress);
}
