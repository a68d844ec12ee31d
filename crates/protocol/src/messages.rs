use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Opens a chunked upload session, or resumes the one named by `upload_id`.
///
/// Re-sending the same `upload_id` with the same file metadata is idempotent:
/// the server answers with the existing session and its persisted chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiateRequest {
    pub filename: String,
    pub total_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}

/// Asks the server to assemble a session's chunks into a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub upload_id: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Server view of a session, returned by negotiate and status queries.
///
/// `chunk_size` is authoritative and may differ from the requested one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_chunks: u32,
    #[serde(default)]
    pub uploaded_chunks: Vec<u32>,
}

/// Acknowledges one accepted chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAck {
    pub upload_id: String,
    pub chunk_index: u32,
    #[serde(default)]
    pub uploaded_chunks: Vec<u32>,
}
