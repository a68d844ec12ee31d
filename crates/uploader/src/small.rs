//! Single-request path for files at or below the size threshold.

use skydrop_protocol::FileDescriptor;
use skydrop_transfer::SourceFile;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::UploadError;
use crate::remote::SessionApi;
use crate::sink::ProgressSink;

/// Sends a whole file in one request.
///
/// Progress is bytes handed to the transport over the file size. Failures
/// are returned unchanged; this layer never retries.
pub struct SmallTransferPath<'a> {
    api: &'a dyn SessionApi,
    cancel: CancellationToken,
}

impl<'a> SmallTransferPath<'a> {
    pub fn new(api: &'a dyn SessionApi, cancel: CancellationToken) -> Self {
        Self { api, cancel }
    }

    pub async fn send(
        &self,
        file: &SourceFile,
        destination: Option<i64>,
        sink: &ProgressSink,
    ) -> Result<FileDescriptor, UploadError> {
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
        let request = self.api.send_direct(file, destination, sent_tx);
        tokio::pin!(request);

        let mut progress_open = true;
        let result = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Err(UploadError::Cancelled),
                sent = sent_rx.recv(), if progress_open => match sent {
                    Some(bytes) => sink.progress(percent_of(bytes, file.size)).await,
                    None => progress_open = false,
                },
                r = &mut request => break r,
            }
        };

        // Updates queued just before the response landed.
        if result.is_ok() {
            while let Ok(bytes) = sent_rx.try_recv() {
                sink.progress(percent_of(bytes, file.size)).await;
            }
            debug!(file = %file.name, bytes = file.size, "direct upload finished");
        }
        result
    }
}

fn percent_of(sent: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    sent as f64 / total as f64 * 100.0
}
