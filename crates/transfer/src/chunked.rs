use std::collections::BTreeSet;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;

// ---------------------------------------------------------------------------
// Chunk arithmetic
// ---------------------------------------------------------------------------

/// Number of chunks needed to cover `file_size` bytes: `ceil(size / chunk)`.
pub fn chunk_count(file_size: u64, chunk_size: u64) -> Result<u32, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidChunkSize(chunk_size));
    }
    let count = file_size.div_ceil(chunk_size);
    u32::try_from(count).map_err(|_| TransferError::TooManyChunks(count))
}

/// Byte range `[index * chunk, min(size, (index + 1) * chunk))` of a chunk.
///
/// Indices past the end yield an empty range at `file_size`.
pub fn chunk_range(file_size: u64, chunk_size: u64, index: u32) -> Range<u64> {
    let start = (index as u64).saturating_mul(chunk_size).min(file_size);
    let end = start.saturating_add(chunk_size).min(file_size);
    start..end
}

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// Authoritative chunking of one file, derived from session negotiation.
///
/// Invariant: every persisted index is `< total_chunks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
    total_chunks: u32,
    persisted: BTreeSet<u32>,
}

impl ChunkPlan {
    /// Builds a plan, computing the chunk count from the sizes.
    pub fn new(
        file_size: u64,
        chunk_size: u64,
        persisted: impl IntoIterator<Item = u32>,
    ) -> Result<Self, TransferError> {
        let total_chunks = chunk_count(file_size, chunk_size)?;
        Self::with_total(file_size, chunk_size, total_chunks, persisted)
    }

    /// Builds a plan from a server-reported chunk count, rejecting counts
    /// that disagree with the sizes and persisted indices out of range.
    pub fn with_total(
        file_size: u64,
        chunk_size: u64,
        total_chunks: u32,
        persisted: impl IntoIterator<Item = u32>,
    ) -> Result<Self, TransferError> {
        let expected = chunk_count(file_size, chunk_size)?;
        if total_chunks != expected {
            return Err(TransferError::ChunkCountMismatch {
                reported: total_chunks,
                expected,
            });
        }

        let persisted: BTreeSet<u32> = persisted.into_iter().collect();
        if let Some(&index) = persisted.iter().find(|&&i| i >= total_chunks) {
            return Err(TransferError::ChunkOutOfRange {
                index,
                total: total_chunks,
            });
        }

        Ok(Self {
            file_size,
            chunk_size,
            total_chunks,
            persisted,
        })
    }

    /// File size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Negotiated chunk size in bytes.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Total number of chunks.
    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Indices the server already holds.
    pub fn persisted(&self) -> &BTreeSet<u32> {
        &self.persisted
    }

    /// Byte range of chunk `index`.
    pub fn chunk_range(&self, index: u32) -> Range<u64> {
        chunk_range(self.file_size, self.chunk_size, index)
    }

    /// Byte length of chunk `index` (the last chunk may be short).
    pub fn chunk_len(&self, index: u32) -> u64 {
        let r = self.chunk_range(index);
        r.end - r.start
    }

    /// Indices still to send, ascending.
    pub fn pending(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|i| !self.persisted.contains(i))
            .collect()
    }

    /// Sum of the byte lengths of persisted chunks.
    pub fn persisted_bytes(&self) -> u64 {
        self.persisted.iter().map(|&i| self.chunk_len(i)).sum()
    }

    /// Returns `true` if the server holds every chunk.
    pub fn is_complete(&self) -> bool {
        self.persisted.len() == self.total_chunks as usize
    }
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads individual chunks of a file by index.
///
/// Each read opens its own handle, so concurrent workers never share a
/// cursor.
#[derive(Debug, Clone)]
pub struct ChunkReader {
    path: PathBuf,
    file_size: u64,
    chunk_size: u64,
}

impl ChunkReader {
    /// Creates a reader for `path` split into `chunk_size` pieces.
    pub fn new(path: &Path, file_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            path: path.to_path_buf(),
            file_size,
            chunk_size,
        })
    }

    /// Reads the bytes of chunk `index`.
    ///
    /// Fails with `UnexpectedEof` if the file shrank since it was planned.
    pub async fn read_chunk(&self, index: u32) -> Result<Vec<u8>, TransferError> {
        let range = chunk_range(self.file_size, self.chunk_size, index);
        let mut buf = vec![0u8; (range.end - range.start) as usize];
        if buf.is_empty() {
            return Ok(buf);
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(range.start)).await?;
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}
