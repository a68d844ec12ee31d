//! Session negotiation and resume.
//!
//! Negotiating with a session key the server already knows returns the
//! original chunk size and the chunks persisted so far, so an interrupted
//! upload resumes instead of restarting.

use skydrop_protocol::{NegotiateRequest, SessionDescriptor};
use skydrop_transfer::{ChunkPlan, SourceFile, validate_session_key};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::remote::SessionApi;

/// Result of a successful negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedSession {
    /// Key returned by the server; used for every later call.
    pub session_key: String,
    /// Chunking built from the server's authoritative chunk size.
    pub plan: ChunkPlan,
}

pub struct SessionNegotiator<'a> {
    api: &'a dyn SessionApi,
    cancel: CancellationToken,
}

impl<'a> SessionNegotiator<'a> {
    pub fn new(api: &'a dyn SessionApi, cancel: CancellationToken) -> Self {
        Self { api, cancel }
    }

    /// Opens or resumes the session for `file`.
    pub async fn negotiate(
        &self,
        session_key: &str,
        file: &SourceFile,
        requested_chunk_size: u64,
        destination: Option<i64>,
    ) -> Result<NegotiatedSession, UploadError> {
        let request = NegotiateRequest {
            filename: file.name.clone(),
            total_size: file.size,
            chunk_size: Some(requested_chunk_size),
            parent_id: destination,
            mime_type: file.mime_type.clone(),
            upload_id: Some(session_key.to_string()),
        };

        let descriptor = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
            r = self.api.negotiate(&request) => r?,
        };

        if descriptor.upload_id != session_key {
            warn!(
                requested = %session_key,
                returned = %descriptor.upload_id,
                "server assigned a different session key"
            );
        }
        if descriptor.chunk_size != requested_chunk_size {
            debug!(
                requested = requested_chunk_size,
                authoritative = descriptor.chunk_size,
                "server overrode chunk size"
            );
        }

        let session = build_session(file.size, descriptor)?;
        info!(
            session = %session.session_key,
            file = %file.name,
            chunk_size = session.plan.chunk_size(),
            total_chunks = session.plan.total_chunks(),
            persisted = session.plan.persisted().len(),
            "session negotiated"
        );
        Ok(session)
    }

    /// Fetches the server view of an existing session.
    pub async fn status(&self, session_key: &str) -> Result<SessionDescriptor, UploadError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            r = self.api.status(session_key) => r,
        }
    }
}

/// Validates a server descriptor against the local file size.
fn build_session(
    file_size: u64,
    descriptor: SessionDescriptor,
) -> Result<NegotiatedSession, UploadError> {
    validate_session_key(&descriptor.upload_id).map_err(|e| {
        UploadError::Protocol(format!("server returned an unusable session key: {e}"))
    })?;

    let plan = ChunkPlan::with_total(
        file_size,
        descriptor.chunk_size,
        descriptor.total_chunks,
        descriptor.uploaded_chunks,
    )
    .map_err(|e| UploadError::Protocol(format!("inconsistent session descriptor: {e}")))?;

    Ok(NegotiatedSession {
        session_key: descriptor.upload_id,
        plan,
    })
}
