//! Engine tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use skydrop_transfer::{DEFAULT_CHUNK_SIZE, LARGE_FILE_THRESHOLD};

/// Tuning for the upload engine.
///
/// Missing fields fall back to defaults, so a partial `[engine]` table in a
/// config file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Files at or below this size take the single-request path.
    pub large_file_threshold: u64,
    /// Chunk size requested during negotiation. The server may override it.
    pub chunk_size: u64,
    /// Chunks in flight per file.
    pub chunk_concurrency: usize,
    /// Attempts per chunk, including the first one.
    pub max_attempts: u32,
    /// Backoff unit; the wait after failed attempt `k` is `k` units.
    pub retry_base_delay_ms: u64,
    /// Files uploading at once in an ingest batch.
    pub file_concurrency: usize,
    /// Discard the server session when a chunked task is cancelled.
    pub abort_on_cancel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            large_file_threshold: LARGE_FILE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_concurrency: 1,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            file_concurrency: 1,
            abort_on_cancel: false,
        }
    }
}

impl EngineConfig {
    pub fn with_chunk_concurrency(mut self, n: usize) -> Self {
        self.chunk_concurrency = n;
        self
    }

    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n;
        self
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay_ms = delay.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_large_file_threshold(mut self, bytes: u64) -> Self {
        self.large_file_threshold = bytes;
        self
    }

    pub fn with_chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_abort_on_cancel(mut self, abort: bool) -> Self {
        self.abort_on_cancel = abort;
        self
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Chunk concurrency with zero treated as one.
    pub fn effective_chunk_concurrency(&self) -> usize {
        self.chunk_concurrency.max(1)
    }

    /// File concurrency with zero treated as one.
    pub fn effective_file_concurrency(&self) -> usize {
        self.file_concurrency.max(1)
    }

    /// Attempts per chunk with zero treated as one.
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
