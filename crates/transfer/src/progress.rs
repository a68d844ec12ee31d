use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Clamps a percentage to `[0, 100]`; non-finite values become 0.
pub fn clamp_percent(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Byte-accurate progress accumulator for one transfer task.
///
/// Safe to share between concurrently completing chunk workers. The
/// transferred count never decreases and never exceeds the file size.
#[derive(Debug)]
pub struct ProgressAggregator {
    total_bytes: u64,
    transferred: AtomicU64,
    completed_chunks: Mutex<HashSet<u32>>,
}

impl ProgressAggregator {
    /// Creates an aggregator seeded with bytes the server already holds.
    pub fn init(total_bytes: u64, seed_bytes: u64) -> Self {
        Self {
            total_bytes,
            transferred: AtomicU64::new(seed_bytes.min(total_bytes)),
            completed_chunks: Mutex::new(HashSet::new()),
        }
    }

    /// Adds confirmed bytes and returns the new total.
    pub fn add(&self, delta_bytes: u64) -> u64 {
        let total = self.total_bytes;
        let previous = self
            .transferred
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(delta_bytes).min(total))
            })
            .unwrap_or_else(|v| v);
        previous.saturating_add(delta_bytes).min(total)
    }

    /// Credits a chunk's bytes the first time `index` is reported.
    ///
    /// Returns `false` (and changes nothing) for an index already credited.
    pub fn complete_chunk(&self, index: u32, chunk_bytes: u64) -> bool {
        let first = self
            .completed_chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index);
        if first {
            self.add(chunk_bytes);
        }
        first
    }

    /// Bytes confirmed so far.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred.load(Ordering::Acquire)
    }

    /// Total bytes of the task.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Confirmed progress as a percentage in `[0, 100]`.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        clamp_percent(self.transferred_bytes() as f64 / self.total_bytes as f64 * 100.0)
    }
}
