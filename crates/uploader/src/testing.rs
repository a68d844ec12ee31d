//! In-memory `SessionApi` used by the engine tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use skydrop_protocol::{ChunkAck, FileDescriptor, NegotiateRequest, SessionDescriptor};
use skydrop_transfer::SourceFile;
use tokio::sync::mpsc;

use crate::error::UploadError;
use crate::remote::{ApiFuture, SessionApi};
use crate::types::UploadEvent;

pub const MIB: u64 = 1024 * 1024;

/// Scripted failure, materialized into a fresh `UploadError` per call.
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Transient,
    Rejected(u16),
}

impl Fail {
    fn into_error(self) -> UploadError {
        match self {
            Self::Transient => UploadError::Transient("connection reset".into()),
            Self::Rejected(status) => UploadError::Rejected {
                status: Some(status),
                message: format!("HTTP {status}"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Negotiate(NegotiateRequest),
    Status(String),
    Chunk { index: u32, len: usize },
    Complete(String),
    Abort(String),
    Direct { name: String, destination: Option<i64> },
}

#[derive(Default)]
pub struct MockApi {
    /// Overrides the chunk size the client asked for.
    pub server_chunk_size: Option<u64>,
    /// Chunks the server already holds when a session is negotiated.
    pub persisted: Vec<u32>,
    /// Session key the server hands back instead of the requested one.
    pub server_key: Option<String>,
    /// Adds this to the reported chunk count.
    pub total_skew: u32,
    pub negotiate_fail: Option<Fail>,
    pub direct_fail: Option<Fail>,
    /// Direct sends report half the bytes, then never resolve.
    pub hang_direct: bool,
    /// Per-file latency of direct sends, keyed by file name.
    pub direct_delays: HashMap<String, Duration>,
    /// Chunk sends never resolve.
    pub hang_chunks: bool,
    pub chunk_delay: Option<Duration>,

    pub chunk_script: Mutex<HashMap<u32, VecDeque<Fail>>>,
    pub complete_script: Mutex<VecDeque<Fail>>,
    pub received: Mutex<BTreeSet<u32>>,
    // (total_size, chunk_size) of the last negotiated session.
    pub shape: Mutex<Option<(u64, u64)>>,
    pub calls: Mutex<Vec<Call>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues failures for successive sends of chunk `index`.
    pub fn fail_chunk(&self, index: u32, fails: &[Fail]) {
        self.chunk_script
            .lock()
            .unwrap()
            .entry(index)
            .or_default()
            .extend(fails.iter().copied());
    }

    /// Queues failures for successive finalize calls.
    pub fn fail_complete(&self, fails: &[Fail]) {
        self.complete_script
            .lock()
            .unwrap()
            .extend(fails.iter().copied());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Chunk indices sent, in send order, one entry per attempt.
    pub fn chunk_attempts(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Chunk { index, .. } => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn effective_key(&self, requested: Option<&str>) -> String {
        self.server_key
            .clone()
            .or_else(|| requested.map(str::to_string))
            .unwrap_or_else(|| "srv_generated_key".into())
    }

    fn descriptor(&self, key: String, total_size: u64, chunk_size: u64) -> SessionDescriptor {
        let mut uploaded: BTreeSet<u32> = self.persisted.iter().copied().collect();
        uploaded.extend(self.received.lock().unwrap().iter().copied());
        SessionDescriptor {
            upload_id: key,
            chunk_size,
            total_chunks: total_size.div_ceil(chunk_size) as u32 + self.total_skew,
            uploaded_chunks: uploaded.into_iter().collect(),
        }
    }
}

pub fn descriptor(id: i64, name: &str) -> FileDescriptor {
    FileDescriptor {
        id,
        name: name.into(),
        status: Some("ready".into()),
        description: None,
        file_size: None,
        mime_type: None,
        uploader_id: None,
        parent_id: None,
        created_at: None,
    }
}

impl SessionApi for MockApi {
    fn negotiate<'a>(&'a self, request: &'a NegotiateRequest) -> ApiFuture<'a, SessionDescriptor> {
        Box::pin(async move {
            self.record(Call::Negotiate(request.clone()));
            if let Some(fail) = self.negotiate_fail {
                return Err(fail.into_error());
            }
            let chunk_size = self
                .server_chunk_size
                .or(request.chunk_size)
                .unwrap_or(5 * MIB);
            let key = self.effective_key(request.upload_id.as_deref());
            *self.shape.lock().unwrap() = Some((request.total_size, chunk_size));
            Ok(self.descriptor(key, request.total_size, chunk_size))
        })
    }

    fn status<'a>(&'a self, session_key: &'a str) -> ApiFuture<'a, SessionDescriptor> {
        Box::pin(async move {
            self.record(Call::Status(session_key.to_string()));
            let (total_size, chunk_size) = self.shape.lock().unwrap().unwrap_or((10, 4));
            Ok(self.descriptor(session_key.to_string(), total_size, chunk_size))
        })
    }

    fn send_chunk<'a>(
        &'a self,
        session_key: &'a str,
        _file_name: &'a str,
        index: u32,
        data: &'a [u8],
    ) -> ApiFuture<'a, ChunkAck> {
        Box::pin(async move {
            self.record(Call::Chunk {
                index,
                len: data.len(),
            });
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if self.hang_chunks {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let scripted = self
                .chunk_script
                .lock()
                .unwrap()
                .get_mut(&index)
                .and_then(VecDeque::pop_front);
            if let Some(fail) = scripted {
                return Err(fail.into_error());
            }

            let mut received = self.received.lock().unwrap();
            received.insert(index);
            Ok(ChunkAck {
                upload_id: session_key.to_string(),
                chunk_index: index,
                uploaded_chunks: received.iter().copied().collect(),
            })
        })
    }

    fn complete<'a>(&'a self, session_key: &'a str) -> ApiFuture<'a, FileDescriptor> {
        Box::pin(async move {
            self.record(Call::Complete(session_key.to_string()));
            if let Some(fail) = self.complete_script.lock().unwrap().pop_front() {
                return Err(fail.into_error());
            }
            Ok(descriptor(100, "assembled.bin"))
        })
    }

    fn abort<'a>(&'a self, session_key: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::Abort(session_key.to_string()));
            Ok(())
        })
    }

    fn send_direct<'a>(
        &'a self,
        file: &'a SourceFile,
        destination: Option<i64>,
        sent_tx: mpsc::UnboundedSender<u64>,
    ) -> ApiFuture<'a, FileDescriptor> {
        Box::pin(async move {
            self.record(Call::Direct {
                name: file.name.clone(),
                destination,
            });
            let _ = sent_tx.send(file.size / 2);
            if self.hang_direct {
                std::future::pending::<()>().await;
            }
            if let Some(&delay) = self.direct_delays.get(&file.name) {
                tokio::time::sleep(delay).await;
            }
            let _ = sent_tx.send(file.size);
            if let Some(fail) = self.direct_fail {
                return Err(fail.into_error());
            }
            Ok(descriptor(1, &file.name))
        })
    }
}

/// Creates a sparse file of `size` bytes and returns its descriptor.
pub async fn source_file(dir: &Path, name: &str, size: u64) -> SourceFile {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    file.set_len(size).unwrap();
    SourceFile::from_path(&path).await.unwrap()
}

/// Creates a file with the given contents and returns its descriptor.
pub async fn source_file_with(dir: &Path, name: &str, data: &[u8]) -> SourceFile {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(data).unwrap();
    SourceFile::from_path(&path).await.unwrap()
}

pub fn drain(rx: &mut mpsc::Receiver<UploadEvent>) -> Vec<UploadEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Progress percentages in emission order.
pub fn percents(events: &[UploadEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|e| match e {
            UploadEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}
