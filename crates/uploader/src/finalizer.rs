//! Session assembly.

use skydrop_protocol::FileDescriptor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::UploadError;
use crate::remote::SessionApi;

/// Asks the server to assemble a fully transmitted session.
///
/// Any failure other than cancellation is wrapped in
/// [`UploadError::FinalizeFailed`] so callers can tell "all chunks are
/// there, assembly failed" apart from a lost chunk and retry only this
/// step.
pub struct Finalizer<'a> {
    api: &'a dyn SessionApi,
    cancel: CancellationToken,
}

impl<'a> Finalizer<'a> {
    pub fn new(api: &'a dyn SessionApi, cancel: CancellationToken) -> Self {
        Self { api, cancel }
    }

    pub async fn complete(&self, session_key: &str) -> Result<FileDescriptor, UploadError> {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
            r = self.api.complete(session_key) => r,
        };

        match result {
            Ok(file) => {
                info!(session = %session_key, file_id = file.id, "session finalized");
                Ok(file)
            }
            Err(e) => {
                warn!(session = %session_key, error = %e, "finalize failed");
                Err(UploadError::FinalizeFailed {
                    session_key: session_key.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }
}
