//! Batch ingestion with a bounded worker pool.
//!
//! Every file gets its own notification identity and runs through
//! [`UploadOrchestrator`] independently: one file failing never stops its
//! siblings.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{self, StreamExt};
use skydrop_transfer::{SourceFile, TransferStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::orchestrator::UploadOrchestrator;
use crate::remote::SessionApi;
use crate::sink::ProgressSink;
use crate::types::{IngestEntry, IngestOutcome, IngestReport, TerminalOutcome, UploadEvent};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Uploads batches of files and reports per-file and aggregate outcomes.
pub struct IngestQueue {
    api: Arc<dyn SessionApi>,
    config: EngineConfig,
    cancel: Mutex<CancellationToken>,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
}

impl IngestQueue {
    pub fn new(api: Arc<dyn SessionApi>, config: EngineConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            config,
            cancel: Mutex::new(CancellationToken::new()),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// The receiver must be drained while a batch runs; a full channel
    /// stalls the workers.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the token that cancels the running batch, or the next one
    /// if none is running.
    ///
    /// A batch that ends cancelled re-arms the queue with a fresh token,
    /// so fetch a new one before each batch you may want to cancel.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Uploads `files` into `destination`.
    ///
    /// Emits `Status(Pending)` for every file before any transfer starts,
    /// then per-file events, then `Refresh` if anything succeeded and
    /// `BatchFailed` if anything did not. An empty batch emits nothing.
    /// Entries are reported in input order whatever order files finish in.
    pub async fn ingest(&self, files: Vec<SourceFile>, destination: Option<i64>) -> IngestReport {
        if files.is_empty() {
            return IngestReport::default();
        }

        let mut queued = Vec::with_capacity(files.len());
        for file in files {
            let sink = ProgressSink::new(
                format!("upload-{}", Uuid::new_v4()),
                self.events_tx.clone(),
            );
            sink.status(TransferStatus::Pending).await;
            queued.push((file, sink));
        }

        let cancel = self.cancel_token();
        let orchestrator =
            UploadOrchestrator::with_cancel(self.api.clone(), self.config.clone(), cancel.clone());
        let workers = self.config.effective_file_concurrency();
        info!(files = queued.len(), workers, "ingest started");

        // Each worker takes the next file as soon as its current one ends.
        let mut indexed: Vec<(usize, IngestEntry)> = stream::iter(queued.into_iter().enumerate())
            .map(|(index, (file, sink))| {
                let orchestrator = &orchestrator;
                async move {
                    let entry = ingest_one(orchestrator, file, destination, sink).await;
                    (index, entry)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        let entries = indexed.into_iter().map(|(_, entry)| entry).collect();

        if cancel.is_cancelled() {
            debug!("batch cancelled, re-arming queue");
            *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) =
                CancellationToken::new();
        }

        let report = IngestReport::from_entries(entries);
        if report.successes > 0 {
            let _ = self.events_tx.send(UploadEvent::Refresh).await;
        }
        if report.failures > 0 {
            warn!(
                successes = report.successes,
                failures = report.failures,
                "ingest finished with failures"
            );
            let _ = self
                .events_tx
                .send(UploadEvent::BatchFailed {
                    failures: report.failed_entries(),
                })
                .await;
        } else {
            info!(successes = report.successes, "ingest finished");
        }
        report
    }
}

async fn ingest_one(
    orchestrator: &UploadOrchestrator,
    file: SourceFile,
    destination: Option<i64>,
    sink: ProgressSink,
) -> IngestEntry {
    let file_name = file.name.clone();
    let outcome = match orchestrator.submit(file, destination, &sink).await {
        TerminalOutcome::Completed(file) => IngestOutcome::Success { file },
        TerminalOutcome::Failed(e) => IngestOutcome::Failure {
            kind: e.kind(),
            reason: e.to_string(),
        },
        TerminalOutcome::Aborted => IngestOutcome::Aborted,
    };
    IngestEntry {
        file_name,
        notification_id: sink.task_id().to_string(),
        outcome,
    }
}
