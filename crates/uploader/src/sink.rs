//! Per-task event sink.
//!
//! Wraps the shared event channel and enforces the per-task event
//! contract: percent never decreases, a completed task reports 100 right
//! before `Completed`, and exactly one terminal event is sent.

use skydrop_protocol::FileDescriptor;
use skydrop_transfer::{TransferStatus, clamp_percent};
use tokio::sync::{Mutex, mpsc};

use crate::error::UploadError;
use crate::types::UploadEvent;

#[derive(Debug, Default)]
struct SinkState {
    last_percent: Option<f64>,
    terminated: bool,
}

/// Event sink for one upload task.
#[derive(Debug)]
pub struct ProgressSink {
    task_id: String,
    events_tx: mpsc::Sender<UploadEvent>,
    // Held across `send` so concurrent workers cannot reorder events.
    state: Mutex<SinkState>,
}

impl ProgressSink {
    pub fn new(task_id: impl Into<String>, events_tx: mpsc::Sender<UploadEvent>) -> Self {
        Self {
            task_id: task_id.into(),
            events_tx,
            state: Mutex::new(SinkState::default()),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Reports a phase change. Ignored once the task is terminal.
    pub async fn status(&self, status: TransferStatus) {
        let state = self.state.lock().await;
        if state.terminated {
            return;
        }
        self.emit(UploadEvent::Status {
            task_id: self.task_id.clone(),
            status,
        })
        .await;
    }

    /// Reports progress. Values at or below the last reported one are dropped.
    pub async fn progress(&self, percent: f64) {
        let mut state = self.state.lock().await;
        if state.terminated {
            return;
        }
        let percent = clamp_percent(percent);
        if state.last_percent.is_some_and(|last| percent <= last) {
            return;
        }
        state.last_percent = Some(percent);
        self.emit(UploadEvent::Progress {
            task_id: self.task_id.clone(),
            percent,
        })
        .await;
    }

    /// Terminal success: `Progress(100)` then `Completed`.
    pub async fn complete(&self, file: FileDescriptor) {
        let mut state = self.state.lock().await;
        if state.terminated {
            return;
        }
        state.terminated = true;
        // Sent even if 100 was already reported, so it directly precedes
        // `Completed` regardless of status events in between.
        state.last_percent = Some(100.0);
        self.emit(UploadEvent::Progress {
            task_id: self.task_id.clone(),
            percent: 100.0,
        })
        .await;
        self.emit(UploadEvent::Completed {
            task_id: self.task_id.clone(),
            file,
        })
        .await;
    }

    /// Terminal failure.
    pub async fn fail(&self, error: &UploadError) {
        let mut state = self.state.lock().await;
        if state.terminated {
            return;
        }
        state.terminated = true;
        self.emit(UploadEvent::Failed {
            task_id: self.task_id.clone(),
            kind: error.kind(),
            error: error.to_string(),
        })
        .await;
    }

    /// Terminal cancellation.
    pub async fn abort(&self) {
        let mut state = self.state.lock().await;
        if state.terminated {
            return;
        }
        state.terminated = true;
        self.emit(UploadEvent::Aborted {
            task_id: self.task_id.clone(),
        })
        .await;
    }

    async fn emit(&self, event: UploadEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events_tx.send(event).await;
    }
}
