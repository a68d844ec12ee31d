//! Upload orchestration engine.
//!
//! This crate implements the **business logic** of moving local files to
//! the remote store. It has no transport dependency: the caller provides a
//! [`SessionApi`] implementation (the `skydrop-http` crate ships one over
//! HTTP; tests use an in-memory mock).
//!
//! # Pipeline
//!
//! 1. **Validate** — reject unreadable or zero-length files
//! 2. **Route** — files at or below the threshold go through
//!    [`SmallTransferPath`] in one request
//! 3. **Negotiate** — open or resume a session, learning the authoritative
//!    chunk size and which chunks the server already holds
//! 4. **Schedule** — send the missing chunks with bounded concurrency and
//!    per-chunk retry
//! 5. **Finalize** — ask the server to assemble the file
//!
//! [`IngestQueue`] runs step 1–5 for a batch of files with a bounded worker
//! pool and aggregates per-file outcomes.

pub mod config;
pub mod error;
pub mod finalizer;
pub mod ingest;
pub mod negotiator;
pub mod orchestrator;
pub mod remote;
pub mod scanner;
pub mod scheduler;
pub mod sink;
pub mod small;
pub mod transmitter;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export primary types for convenience.
pub use config::EngineConfig;
pub use error::{ErrorKind, UploadError};
pub use finalizer::Finalizer;
pub use ingest::IngestQueue;
pub use negotiator::{NegotiatedSession, SessionNegotiator};
pub use orchestrator::UploadOrchestrator;
pub use remote::{ApiFuture, SessionApi};
pub use scanner::scan_sources;
pub use scheduler::ChunkScheduler;
pub use sink::ProgressSink;
pub use small::SmallTransferPath;
pub use transmitter::ChunkTransmitter;
pub use types::{IngestEntry, IngestOutcome, IngestReport, TerminalOutcome, TransferTask, UploadEvent};
