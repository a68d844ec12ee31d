//! Single-chunk transmission with linear-backoff retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use skydrop_transfer::ChunkReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::UploadError;
use crate::remote::SessionApi;

/// Sends one chunk, retrying transient failures.
///
/// The wait after failed attempt `k` is `base_delay * k`. Only
/// [`UploadError::Transient`] is retried; anything else is returned as-is.
pub struct ChunkTransmitter<'a> {
    api: &'a dyn SessionApi,
    max_attempts: u32,
    base_delay: Duration,
    cancel: CancellationToken,
}

impl<'a> ChunkTransmitter<'a> {
    pub fn new(api: &'a dyn SessionApi, config: &EngineConfig, cancel: CancellationToken) -> Self {
        Self {
            api,
            max_attempts: config.effective_max_attempts(),
            base_delay: config.retry_base_delay(),
            cancel,
        }
    }

    /// Sends chunk `index` and returns its byte length on success.
    ///
    /// The chunk is read from disk once and reused across attempts.
    pub async fn send(
        &self,
        reader: &ChunkReader,
        file_name: &str,
        session_key: &str,
        index: u32,
    ) -> Result<u64, UploadError> {
        self.send_until(reader, file_name, session_key, index, None)
            .await
    }

    /// Like [`send`](Self::send), but once `halted` is set a transient
    /// failure is returned as-is instead of being retried.
    pub(crate) async fn send_until(
        &self,
        reader: &ChunkReader,
        file_name: &str,
        session_key: &str,
        index: u32,
        halted: Option<&AtomicBool>,
    ) -> Result<u64, UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        let data = reader.read_chunk(index).await?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                r = self.api.send_chunk(session_key, file_name, index, &data) => r,
            };

            let err = match result {
                Ok(ack) if ack.chunk_index != index => {
                    return Err(UploadError::Protocol(format!(
                        "server acknowledged chunk {} for chunk {index}",
                        ack.chunk_index
                    )));
                }
                Ok(_) => {
                    debug!(session = %session_key, chunk = index, attempt, bytes = data.len(), "chunk sent");
                    return Ok(data.len() as u64);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            if halted.is_some_and(|h| h.load(Ordering::Acquire)) {
                debug!(session = %session_key, chunk = index, attempt, error = %err, "dispatch halted, not retrying");
                return Err(err);
            }
            if attempt >= self.max_attempts {
                warn!(session = %session_key, chunk = index, attempts = attempt, error = %err, "chunk gave up");
                return Err(UploadError::RetriesExhausted {
                    index,
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.base_delay * attempt;
            warn!(
                session = %session_key,
                chunk = index,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "chunk failed, retrying"
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
