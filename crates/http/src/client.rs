//! `reqwest` client for the upload session API.
//!
//! Requests carry Bearer token authentication when a token is configured.

use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, Url};
use serde::de::DeserializeOwned;
use skydrop_protocol::constants::{
    CONNECT_TIMEOUT, FIELD_CHUNK, FIELD_CHUNK_INDEX, FIELD_FILE, FIELD_PARENT_ID,
    FIELD_UPLOAD_ID, PATH_DIRECT_UPLOAD, PATH_MULTIPART_CHUNK, PATH_MULTIPART_COMPLETE,
    PATH_MULTIPART_INIT, PATH_MULTIPART_SESSION, chunk_part_name,
};
use skydrop_protocol::{
    ChunkAck, CompleteRequest, FileDescriptor, NegotiateRequest, SessionDescriptor,
};
use skydrop_transfer::SourceFile;
use skydrop_uploader::{ApiFuture, SessionApi, UploadError};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::status::{status_error, transport_error};

const OCTET_STREAM: &str = "application/octet-stream";

/// Errors building an [`HttpSessionApi`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base URL {0:?}")]
    InvalidBaseUrl(String),

    #[error("invalid API token")]
    InvalidToken,
}

/// Session API client over HTTP.
pub struct HttpSessionApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSessionApi {
    /// Creates a client for `base_url` (e.g. `http://localhost:8000/api`).
    ///
    /// `request_timeout` bounds whole requests; `None` leaves them
    /// unbounded so slow chunk and direct sends are not cut off. Connecting
    /// is always bounded.
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, Error> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|_| Error::InvalidBaseUrl(base_url.clone()))?;

        let mut headers = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| Error::InvalidToken)?,
            );
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("skydrop/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of `/files/multipart/{session_key}` with the key as one segment.
    fn session_url(&self, session_key: &str) -> Result<Url, UploadError> {
        let mut url = Url::parse(&self.endpoint(PATH_MULTIPART_SESSION))
            .map_err(|e| UploadError::Protocol(format!("invalid session URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| UploadError::Protocol("base URL cannot carry a path".into()))?
            .push(session_key);
        Ok(url)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, UploadError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(resp).await
    }
}

/// Checks the status and decodes a JSON success body.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, UploadError> {
    let status = resp.status();
    let body = resp.bytes().await.map_err(transport_error)?;
    if !status.is_success() {
        return Err(status_error(status.as_u16(), &body));
    }
    serde_json::from_slice(&body)
        .map_err(|e| UploadError::Protocol(format!("unexpected response body: {e}")))
}

/// Checks the status and discards the body.
async fn expect_success(resp: Response) -> Result<(), UploadError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.bytes().await.map_err(transport_error)?;
    Err(status_error(status.as_u16(), &body))
}

impl SessionApi for HttpSessionApi {
    fn negotiate<'a>(&'a self, request: &'a NegotiateRequest) -> ApiFuture<'a, SessionDescriptor> {
        Box::pin(async move { self.post_json(PATH_MULTIPART_INIT, request).await })
    }

    fn status<'a>(&'a self, session_key: &'a str) -> ApiFuture<'a, SessionDescriptor> {
        Box::pin(async move {
            let resp = self
                .http
                .get(self.session_url(session_key)?)
                .send()
                .await
                .map_err(transport_error)?;
            decode(resp).await
        })
    }

    fn send_chunk<'a>(
        &'a self,
        session_key: &'a str,
        file_name: &'a str,
        index: u32,
        data: &'a [u8],
    ) -> ApiFuture<'a, ChunkAck> {
        Box::pin(async move {
            let part = Part::bytes(data.to_vec())
                .file_name(chunk_part_name(file_name, index))
                .mime_str(OCTET_STREAM)
                .map_err(transport_error)?;
            let form = Form::new()
                .text(FIELD_UPLOAD_ID, session_key.to_string())
                .text(FIELD_CHUNK_INDEX, index.to_string())
                .part(FIELD_CHUNK, part);

            let resp = self
                .http
                .post(self.endpoint(PATH_MULTIPART_CHUNK))
                .multipart(form)
                .send()
                .await
                .map_err(transport_error)?;
            decode(resp).await
        })
    }

    fn complete<'a>(&'a self, session_key: &'a str) -> ApiFuture<'a, FileDescriptor> {
        Box::pin(async move {
            let request = CompleteRequest {
                upload_id: session_key.to_string(),
            };
            self.post_json(PATH_MULTIPART_COMPLETE, &request).await
        })
    }

    fn abort<'a>(&'a self, session_key: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let resp = self
                .http
                .delete(self.session_url(session_key)?)
                .send()
                .await
                .map_err(transport_error)?;
            expect_success(resp).await
        })
    }

    fn send_direct<'a>(
        &'a self,
        file: &'a SourceFile,
        destination: Option<i64>,
        sent_tx: mpsc::UnboundedSender<u64>,
    ) -> ApiFuture<'a, FileDescriptor> {
        Box::pin(async move {
            let handle = tokio::fs::File::open(&file.path).await?;

            let mut sent: u64 = 0;
            let stream = ReaderStream::new(handle).inspect_ok(move |bytes| {
                sent += bytes.len() as u64;
                let _ = sent_tx.send(sent);
            });

            let part = Part::stream_with_length(Body::wrap_stream(stream), file.size)
                .file_name(file.name.clone())
                .mime_str(file.mime_type.as_deref().unwrap_or(OCTET_STREAM))
                .map_err(transport_error)?;
            let mut form = Form::new().part(FIELD_FILE, part);
            if let Some(parent_id) = destination {
                form = form.text(FIELD_PARENT_ID, parent_id.to_string());
            }

            debug!(file = %file.name, bytes = file.size, "direct upload");
            let resp = self
                .http
                .post(self.endpoint(PATH_DIRECT_UPLOAD))
                .multipart(form)
                .send()
                .await
                .map_err(transport_error)?;
            decode(resp).await
        })
    }
}
