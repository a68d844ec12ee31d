//! Transfer primitives for resumable chunked uploads.
//!
//! Everything here is transport-agnostic: chunk arithmetic, reading chunk
//! bytes from disk, byte-accurate progress accounting, and the deterministic
//! session key that lets a re-submitted file resume its remote session.

mod chunked;
mod progress;
mod session_key;
mod types;
mod validation;

pub use chunked::{ChunkPlan, ChunkReader, chunk_count, chunk_range};
pub use progress::{ProgressAggregator, clamp_percent};
pub use session_key::derive_session_key;
pub use types::{SourceFile, TransferStatus, detect_mime_type};
pub use validation::{validate_session_key, validate_source_file};

/// Chunk size requested from the server when negotiating: 2 MiB.
///
/// The server may answer with a different size; the answer wins.
pub const DEFAULT_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// Files at or below this size (20 MiB) are sent in a single request.
pub const LARGE_FILE_THRESHOLD: u64 = 20 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    #[error("chunk {index} out of range (total {total})")]
    ChunkOutOfRange { index: u32, total: u32 },

    #[error("chunk count mismatch: server says {reported}, expected {expected}")]
    ChunkCountMismatch { reported: u32, expected: u32 },

    #[error("too many chunks: {0}")]
    TooManyChunks(u64),

    #[error("invalid session key: {0}")]
    InvalidSessionKey(String),

    #[error("invalid file: {0}")]
    InvalidFile(String),
}
