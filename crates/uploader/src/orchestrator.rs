//! Per-file upload orchestration.
//!
//! Picks the transfer strategy by file size and drives a task to exactly
//! one terminal outcome.

use std::collections::BTreeSet;
use std::sync::Arc;

use skydrop_protocol::{FileDescriptor, SessionDescriptor};
use skydrop_transfer::{
    ChunkReader, ProgressAggregator, SourceFile, TransferStatus, derive_session_key,
    validate_session_key, validate_source_file,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::error::UploadError;
use crate::finalizer::Finalizer;
use crate::negotiator::SessionNegotiator;
use crate::remote::SessionApi;
use crate::scheduler::ChunkScheduler;
use crate::sink::ProgressSink;
use crate::small::SmallTransferPath;
use crate::transmitter::ChunkTransmitter;
use crate::types::{TerminalOutcome, TransferTask};

/// Missing indices listed in a finalize-retry refusal.
const MISSING_PREVIEW: usize = 5;

/// Uploads single files to the remote store.
///
/// Never retries a failed task; that is the caller's call. A cancelled
/// task ends as [`TerminalOutcome::Aborted`].
pub struct UploadOrchestrator {
    api: Arc<dyn SessionApi>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl UploadOrchestrator {
    pub fn new(api: Arc<dyn SessionApi>, config: EngineConfig) -> Self {
        Self::with_cancel(api, config, CancellationToken::new())
    }

    /// Creates an orchestrator driven by an existing cancellation token.
    pub fn with_cancel(
        api: Arc<dyn SessionApi>,
        config: EngineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            config,
            cancel,
        }
    }

    /// Returns the token that cancels every task of this orchestrator.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Uploads `file` into `destination` and reports through `sink`.
    pub async fn submit(
        &self,
        file: SourceFile,
        destination: Option<i64>,
        sink: &ProgressSink,
    ) -> TerminalOutcome {
        let session_key = derive_session_key(&file.name, file.size, file.modified_ms, destination);
        let mut task = TransferTask::new(session_key, file, destination);

        info!(
            task = %sink.task_id(),
            file = %task.file.name,
            size = task.file.size,
            "upload started"
        );
        let result = self.run(&mut task, sink).await;

        let abort_key = (task.session_opened && self.config.abort_on_cancel)
            .then_some(task.session_key.as_str());
        let outcome = self.conclude(result, abort_key, sink).await;
        task.status = outcome.status();
        outcome
    }

    async fn run(
        &self,
        task: &mut TransferTask,
        sink: &ProgressSink,
    ) -> Result<FileDescriptor, UploadError> {
        validate_source_file(&task.file)?;
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        if task.file.size <= self.config.large_file_threshold {
            task.status = TransferStatus::Transferring;
            sink.status(task.status).await;
            return SmallTransferPath::new(self.api.as_ref(), self.cancel.clone())
                .send(&task.file, task.destination, sink)
                .await;
        }

        self.run_chunked(task, sink).await
    }

    async fn run_chunked(
        &self,
        task: &mut TransferTask,
        sink: &ProgressSink,
    ) -> Result<FileDescriptor, UploadError> {
        let api = self.api.as_ref();
        validate_session_key(&task.session_key)?;

        task.status = TransferStatus::Negotiating;
        sink.status(task.status).await;
        let session = SessionNegotiator::new(api, self.cancel.clone())
            .negotiate(
                &task.session_key,
                &task.file,
                self.config.chunk_size,
                task.destination,
            )
            .await?;
        task.session_opened = true;
        task.session_key = session.session_key;
        let plan = session.plan;

        let progress = ProgressAggregator::init(task.file.size, plan.persisted_bytes());
        task.status = TransferStatus::Transferring;
        sink.status(task.status).await;
        sink.progress(progress.percent()).await;

        let reader = ChunkReader::new(&task.file.path, task.file.size, plan.chunk_size())?;
        let transmitter = ChunkTransmitter::new(api, &self.config, self.cancel.clone());
        let scheduler = ChunkScheduler::new(
            transmitter,
            self.config.effective_chunk_concurrency(),
            self.cancel.clone(),
        );
        scheduler
            .run(
                &plan,
                &reader,
                &task.file.name,
                &task.session_key,
                &progress,
                sink,
            )
            .await?;

        task.status = TransferStatus::Finalizing;
        sink.status(task.status).await;
        Finalizer::new(api, self.cancel.clone())
            .complete(&task.session_key)
            .await
    }

    /// Re-runs only the assembly step of a session whose chunks are all on
    /// the server, typically after a [`crate::ErrorKind::FinalizeFailed`]
    /// outcome.
    pub async fn retry_finalize(&self, session_key: &str, sink: &ProgressSink) -> TerminalOutcome {
        let result = self.finalize_existing(session_key, sink).await;
        self.conclude(result, None, sink).await
    }

    async fn finalize_existing(
        &self,
        session_key: &str,
        sink: &ProgressSink,
    ) -> Result<FileDescriptor, UploadError> {
        validate_session_key(session_key)?;
        let descriptor = self.status(session_key).await?;

        let missing = missing_chunks(&descriptor);
        if !missing.is_empty() {
            let preview: Vec<u32> = missing.iter().take(MISSING_PREVIEW).copied().collect();
            return Err(UploadError::Rejected {
                status: None,
                message: format!(
                    "session {session_key} is missing {} chunk(s), first {preview:?}; resubmit the file to resume",
                    missing.len()
                ),
            });
        }

        sink.status(TransferStatus::Finalizing).await;
        Finalizer::new(self.api.as_ref(), self.cancel.clone())
            .complete(session_key)
            .await
    }

    /// Fetches the server view of a session.
    pub async fn status(&self, session_key: &str) -> Result<SessionDescriptor, UploadError> {
        SessionNegotiator::new(self.api.as_ref(), self.cancel.clone())
            .status(session_key)
            .await
    }

    /// Discards a session and its persisted chunks on the server.
    pub async fn abort(&self, session_key: &str) -> Result<(), UploadError> {
        validate_session_key(session_key)?;
        self.api.abort(session_key).await?;
        info!(session = %session_key, "session aborted");
        Ok(())
    }

    async fn conclude(
        &self,
        result: Result<FileDescriptor, UploadError>,
        abort_key: Option<&str>,
        sink: &ProgressSink,
    ) -> TerminalOutcome {
        match result {
            Ok(file) => {
                info!(task = %sink.task_id(), file_id = file.id, name = %file.name, "upload completed");
                sink.complete(file.clone()).await;
                TerminalOutcome::Completed(file)
            }
            Err(UploadError::Cancelled) => {
                if let Some(key) = abort_key
                    && let Err(e) = self.api.abort(key).await
                {
                    warn!(session = %key, error = %e, "abort after cancel failed");
                }
                info!(task = %sink.task_id(), "upload cancelled");
                sink.abort().await;
                TerminalOutcome::Aborted
            }
            Err(e) => {
                error!(task = %sink.task_id(), kind = ?e.kind(), error = %e, "upload failed");
                sink.fail(&e).await;
                TerminalOutcome::Failed(e)
            }
        }
    }
}

fn missing_chunks(descriptor: &SessionDescriptor) -> Vec<u32> {
    let persisted: BTreeSet<u32> = descriptor.uploaded_chunks.iter().copied().collect();
    (0..descriptor.total_chunks)
        .filter(|i| !persisted.contains(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{Call, Fail, MIB, MockApi, drain, percents, source_file};
    use crate::types::UploadEvent;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn orchestrator(api: &Arc<MockApi>, config: EngineConfig) -> UploadOrchestrator {
        UploadOrchestrator::new(api.clone(), config)
    }

    fn sink() -> (ProgressSink, mpsc::Receiver<UploadEvent>) {
        let (tx, rx) = mpsc::channel(512);
        (ProgressSink::new("upload-1", tx), rx)
    }

    fn statuses(events: &[UploadEvent]) -> Vec<TransferStatus> {
        events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Status { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    fn assert_completed_last(events: &[UploadEvent]) {
        let n = events.len();
        assert!(n >= 2);
        assert!(matches!(events[n - 2], UploadEvent::Progress { percent, .. } if percent == 100.0));
        assert!(matches!(events[n - 1], UploadEvent::Completed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn chunked_upload_sends_all_chunks() {
        let dir = TempDir::new().unwrap();
        let file = source_file(dir.path(), "movie.mkv", 25 * MIB).await;
        let api = Arc::new(MockApi::new());
        let (sink, mut rx) = sink();

        let outcome = orchestrator(&api, EngineConfig::default())
            .submit(file, None, &sink)
            .await;

        assert!(outcome.is_success(), "{outcome:?}");
        let chunks = api.chunk_attempts();
        assert_eq!(chunks, (0..13).collect::<Vec<_>>());
        let lens: Vec<usize> = api
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::Chunk { len, .. } => Some(*len),
                _ => None,
            })
            .collect();
        assert!(lens[..12].iter().all(|&l| l as u64 == 2 * MIB));
        assert_eq!(lens[12] as u64, MIB);
        assert_eq!(api.count(|c| matches!(c, Call::Complete(_))), 1);

        let events = drain(&mut rx);
        assert_eq!(
            statuses(&events),
            vec![
                TransferStatus::Negotiating,
                TransferStatus::Transferring,
                TransferStatus::Finalizing
            ]
        );
        let pcts = percents(&events);
        assert_eq!(pcts[0], 0.0);
        assert!(pcts.windows(2).all(|w| w[0] <= w[1]));
        assert_completed_last(&events);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_skips_persisted_chunks() {
        let dir = TempDir::new().unwrap();
        let file = source_file(dir.path(), "movie.mkv", 25 * MIB).await;
        let api = Arc::new(MockApi {
            persisted: vec![0, 1, 2],
            ..MockApi::default()
        });
        let (sink, mut rx) = sink();

        let outcome = orchestrator(&api, EngineConfig::default())
            .submit(file, None, &sink)
            .await;

        assert!(outcome.is_success());
        assert_eq!(api.chunk_attempts(), (3..13).collect::<Vec<_>>());
        let pcts = percents(&drain(&mut rx));
        assert!((pcts[0] - 24.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_boundary_uses_small_path() {
        let dir = TempDir::new().unwrap();
        let at = source_file(dir.path(), "at.bin", 20 * MIB).await;
        let above = source_file(dir.path(), "above.bin", 20 * MIB + 1).await;
        let api = Arc::new(MockApi::new());
        let orch = orchestrator(&api, EngineConfig::default());

        let (sink, mut rx) = sink();
        assert!(orch.submit(at, None, &sink).await.is_success());
        assert_eq!(api.count(|c| matches!(c, Call::Direct { .. })), 1);
        assert_eq!(api.count(|c| matches!(c, Call::Negotiate(_))), 0);
        let events = drain(&mut rx);
        assert_eq!(statuses(&events), vec![TransferStatus::Transferring]);
        assert_completed_last(&events);

        let (sink, _rx) = self::sink();
        assert!(orch.submit(above, None, &sink).await.is_success());
        assert_eq!(api.count(|c| matches!(c, Call::Direct { .. })), 1);
        assert_eq!(api.count(|c| matches!(c, Call::Negotiate(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn session_key_is_derived_from_file() {
        let dir = TempDir::new().unwrap();
        let file = source_file(dir.path(), "movie.mkv", 25 * MIB).await;
        let expected = derive_session_key(&file.name, file.size, file.modified_ms, Some(4));
        let api = Arc::new(MockApi::new());
        let (sink, _rx) = sink();

        orchestrator(&api, EngineConfig::default())
            .submit(file, Some(4), &sink)
            .await;

        match &api.calls()[0] {
            Call::Negotiate(req) => {
                assert_eq!(req.upload_id.as_deref(), Some(expected.as_str()));
                assert_eq!(req.parent_id, Some(4));
            }
            other => panic!("unexpected call {other:?}"),
        }
        assert!(api.calls().contains(&Call::Complete(expected)));
    }

    #[tokio::test]
    async fn empty_file_fails_validation_without_network() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::File::create(&path).unwrap();
        let file = SourceFile::from_path(&path).await.unwrap();
        let api = Arc::new(MockApi::new());
        let (sink, mut rx) = sink();

        let outcome = orchestrator(&api, EngineConfig::default())
            .submit(file, None, &sink)
            .await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::Validation));
        assert!(api.calls().is_empty());
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            UploadEvent::Failed { kind: ErrorKind::Validation, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_chunk_fails_task_without_finalize() {
        let dir = TempDir::new().unwrap();
        let file = source_file(dir.path(), "movie.mkv", 25 * MIB).await;
        let api = Arc::new(MockApi::new());
        api.fail_chunk(4, &[Fail::Transient, Fail::Transient, Fail::Transient]);
        let (sink, mut rx) = sink();

        let outcome = orchestrator(&api, EngineConfig::default())
            .submit(file, None, &sink)
            .await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::RetriesExhausted));
        assert_eq!(api.count(|c| matches!(c, Call::Complete(_))), 0);
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(UploadEvent::Failed { .. })));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, UploadEvent::Progress { percent, .. } if *percent == 100.0))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_failure_is_distinct_and_recoverable() {
        let dir = TempDir::new().unwrap();
        let file = source_file(dir.path(), "movie.mkv", 25 * MIB).await;
        let api = Arc::new(MockApi::new());
        api.fail_complete(&[Fail::Rejected(500)]);
        let orch = orchestrator(&api, EngineConfig::default());

        let (sink, _rx) = sink();
        let outcome = orch.submit(file, None, &sink).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::FinalizeFailed));
        let session_key = match &outcome {
            TerminalOutcome::Failed(UploadError::FinalizeFailed { session_key, .. }) => {
                session_key.clone()
            }
            other => panic!("expected FinalizeFailed, got {other:?}"),
        };

        let (sink, mut rx) = self::sink();
        let retried = orch.retry_finalize(&session_key, &sink).await;
        assert!(retried.is_success());
        // Chunks were not sent a second time.
        assert_eq!(api.chunk_attempts().len(), 13);
        assert_eq!(api.count(|c| matches!(c, Call::Complete(_))), 2);
        assert_completed_last(&drain(&mut rx));
    }

    #[tokio::test]
    async fn retry_finalize_refuses_incomplete_session() {
        let api = Arc::new(MockApi {
            persisted: vec![0],
            ..MockApi::default()
        });
        let (sink, _rx) = sink();

        // Status shape defaults to 3 chunks, only chunk 0 persisted.
        let outcome = orchestrator(&api, EngineConfig::default())
            .retry_finalize("up_key_0001", &sink)
            .await;

        assert_eq!(outcome.error_kind(), Some(ErrorKind::Rejected));
        assert_eq!(api.count(|c| matches!(c, Call::Complete(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_task() {
        let dir = TempDir::new().unwrap();
        let file = source_file(dir.path(), "movie.mkv", 25 * MIB).await;
        let api = Arc::new(MockApi {
            hang_chunks: true,
            ..MockApi::default()
        });
        let orch = orchestrator(&api, EngineConfig::default());
        let cancel = orch.cancel_token();
        let (sink, mut rx) = sink();

        let trigger = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        };
        let (outcome, ()) = tokio::join!(orch.submit(file, None, &sink), trigger);

        assert!(matches!(outcome, TerminalOutcome::Aborted));
        assert_eq!(api.count(|c| matches!(c, Call::Abort(_))), 0);
        assert!(matches!(drain(&mut rx).last(), Some(UploadEvent::Aborted { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_can_abort_session() {
        let dir = TempDir::new().unwrap();
        let file = source_file(dir.path(), "movie.mkv", 25 * MIB).await;
        let api = Arc::new(MockApi {
            hang_chunks: true,
            ..MockApi::default()
        });
        let orch = orchestrator(&api, EngineConfig::default().with_abort_on_cancel(true));
        let cancel = orch.cancel_token();
        let (sink, _rx) = sink();

        let trigger = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        };
        let (outcome, ()) = tokio::join!(orch.submit(file, None, &sink), trigger);

        assert!(matches!(outcome, TerminalOutcome::Aborted));
        assert_eq!(api.count(|c| matches!(c, Call::Abort(_))), 1);
    }

    #[tokio::test]
    async fn abort_rejects_malformed_key() {
        let api = Arc::new(MockApi::new());
        let err = orchestrator(&api, EngineConfig::default())
            .abort("bad key!")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(api.calls().is_empty());
    }
}
