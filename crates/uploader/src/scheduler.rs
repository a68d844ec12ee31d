//! Bounded-concurrency chunk dispatch over a shared cursor.
//!
//! Workers claim pending indices from one atomic cursor, so no index is
//! ever claimed twice. On the first terminal chunk error the scheduler
//! stops handing out new indices, but chunks already in flight run to the
//! end of their current attempt. A few chunks may therefore still reach
//! the server after the failing one is detected; those are kept server-side
//! and picked up by the next resume.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures_util::future::join_all;
use skydrop_transfer::{ChunkPlan, ChunkReader, ProgressAggregator};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::sink::ProgressSink;
use crate::transmitter::ChunkTransmitter;

/// Shared state of one scheduler run.
struct Dispatch<'r> {
    pending: Vec<u32>,
    cursor: AtomicUsize,
    halted: AtomicBool,
    sent: AtomicUsize,
    first_error: Mutex<Option<UploadError>>,
    reader: &'r ChunkReader,
    file_name: &'r str,
    session_key: &'r str,
    progress: &'r ProgressAggregator,
    sink: &'r ProgressSink,
}

impl Dispatch<'_> {
    fn claim(&self) -> Option<u32> {
        if self.halted.load(Ordering::Acquire) {
            return None;
        }
        let slot = self.cursor.fetch_add(1, Ordering::AcqRel);
        self.pending.get(slot).copied()
    }

    fn record_error(&self, err: UploadError) {
        self.halted.store(true, Ordering::Release);
        let mut first = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if first.is_none() {
            *first = Some(err);
        }
    }
}

/// Sends the pending chunks of a plan.
pub struct ChunkScheduler<'a> {
    transmitter: ChunkTransmitter<'a>,
    max_concurrency: usize,
    cancel: CancellationToken,
}

impl<'a> ChunkScheduler<'a> {
    /// Creates a scheduler. A concurrency of zero is treated as one.
    pub fn new(
        transmitter: ChunkTransmitter<'a>,
        max_concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transmitter,
            max_concurrency: max_concurrency.max(1),
            cancel,
        }
    }

    /// Sends every pending chunk of `plan`, crediting `progress` once per
    /// chunk and reporting the new percent to `sink`.
    ///
    /// Returns the number of chunks sent, or the first terminal error once
    /// in-flight work has drained.
    pub async fn run(
        &self,
        plan: &ChunkPlan,
        reader: &ChunkReader,
        file_name: &str,
        session_key: &str,
        progress: &ProgressAggregator,
        sink: &ProgressSink,
    ) -> Result<usize, UploadError> {
        let pending = plan.pending();
        if pending.is_empty() {
            debug!(session = %session_key, "nothing to send");
            return Ok(0);
        }

        let workers = self.max_concurrency.min(pending.len());
        debug!(
            session = %session_key,
            pending = pending.len(),
            workers,
            "dispatching chunks"
        );

        let dispatch = Dispatch {
            pending,
            cursor: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
            sent: AtomicUsize::new(0),
            first_error: Mutex::new(None),
            reader,
            file_name,
            session_key,
            progress,
            sink,
        };

        join_all((0..workers).map(|_| self.worker(&dispatch))).await;

        let first_error = dispatch
            .first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(err) = first_error {
            warn!(
                session = %session_key,
                sent = dispatch.sent.load(Ordering::Acquire),
                error = %err,
                "chunk dispatch halted"
            );
            return Err(err);
        }
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        Ok(dispatch.sent.into_inner())
    }

    async fn worker(&self, dispatch: &Dispatch<'_>) {
        while !self.cancel.is_cancelled() {
            let Some(index) = dispatch.claim() else {
                break;
            };

            let result = self
                .transmitter
                .send_until(
                    dispatch.reader,
                    dispatch.file_name,
                    dispatch.session_key,
                    index,
                    Some(&dispatch.halted),
                )
                .await;

            match result {
                Ok(bytes) => {
                    dispatch.sent.fetch_add(1, Ordering::AcqRel);
                    if dispatch.progress.complete_chunk(index, bytes) {
                        dispatch.sink.progress(dispatch.progress.percent()).await;
                    }
                }
                Err(UploadError::Cancelled) => break,
                Err(err) => {
                    dispatch.record_error(err);
                    break;
                }
            }
        }
    }
}
