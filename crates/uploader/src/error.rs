//! Upload error types and their failure taxonomy.

use serde::{Deserialize, Serialize};
use skydrop_transfer::TransferError;

/// Failure taxonomy every terminal error maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network-level failure; retried at chunk level.
    TransientNetwork,
    /// The server refused the request or answered nonsense; never retried.
    Rejected,
    /// A chunk failed transiently on every attempt.
    RetriesExhausted,
    /// All chunks are on the server but assembly failed; a finalize-only
    /// retry can recover without re-sending chunks.
    FinalizeFailed,
    /// The input was rejected before any network call.
    Validation,
    /// The caller cancelled the task.
    Cancelled,
}

/// Errors produced while uploading.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("network error: {0}")]
    Transient(String),

    #[error("rejected by server: {message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("chunk {index} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        index: u32,
        attempts: u32,
        #[source]
        last: Box<UploadError>,
    },

    #[error("finalize failed for session {session_key}: {source}")]
    FinalizeFailed {
        session_key: String,
        #[source]
        source: Box<UploadError>,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Maps this error onto the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient(_) => ErrorKind::TransientNetwork,
            Self::Rejected { .. } | Self::Protocol(_) | Self::Json(_) => ErrorKind::Rejected,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Self::FinalizeFailed { .. } => ErrorKind::FinalizeFailed,
            Self::Validation(_) | Self::Io(_) => ErrorKind::Validation,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns `true` if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(io) => Self::Io(io),
            TransferError::InvalidFile(msg) | TransferError::InvalidSessionKey(msg) => {
                Self::Validation(msg)
            }
            // Remaining variants only arise from server-supplied chunking.
            other => Self::Protocol(other.to_string()),
        }
    }
}
