//! Remote session API trait.
//!
//! `SessionApi` is implemented by `skydrop-http` on top of `reqwest`.
//! Keeping it a trait lets the engine run against an in-memory mock.

use std::future::Future;
use std::pin::Pin;

use skydrop_protocol::{ChunkAck, FileDescriptor, NegotiateRequest, SessionDescriptor};
use skydrop_transfer::SourceFile;
use tokio::sync::mpsc;

use crate::error::UploadError;

/// Boxed future returned by every [`SessionApi`] call.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// Abstract connection to the remote store.
///
/// Implementations classify their failures: anything a retry may fix is
/// [`UploadError::Transient`], a non-success answer is
/// [`UploadError::Rejected`], and an unparseable success body is
/// [`UploadError::Protocol`].
pub trait SessionApi: Send + Sync {
    /// Opens a session, or resumes the one named by `request.upload_id`.
    fn negotiate<'a>(&'a self, request: &'a NegotiateRequest) -> ApiFuture<'a, SessionDescriptor>;

    /// Fetches the server view of an existing session.
    fn status<'a>(&'a self, session_key: &'a str) -> ApiFuture<'a, SessionDescriptor>;

    /// Sends the bytes of one chunk.
    fn send_chunk<'a>(
        &'a self,
        session_key: &'a str,
        file_name: &'a str,
        index: u32,
        data: &'a [u8],
    ) -> ApiFuture<'a, ChunkAck>;

    /// Asks the server to assemble all chunks into a file.
    fn complete<'a>(&'a self, session_key: &'a str) -> ApiFuture<'a, FileDescriptor>;

    /// Discards a session and its persisted chunks.
    fn abort<'a>(&'a self, session_key: &'a str) -> ApiFuture<'a, ()>;

    /// Sends a whole file in one request.
    ///
    /// Implementations push the cumulative number of bytes handed to the
    /// transport through `sent_tx` as the body streams out.
    fn send_direct<'a>(
        &'a self,
        file: &'a SourceFile,
        destination: Option<i64>,
        sent_tx: mpsc::UnboundedSender<u64>,
    ) -> ApiFuture<'a, FileDescriptor>;
}
