//! Upload task, event and report types.

use serde::{Deserialize, Serialize};
use skydrop_protocol::FileDescriptor;
use skydrop_transfer::{SourceFile, TransferStatus};

use crate::error::{ErrorKind, UploadError};

/// Event emitted during uploads, keyed by the caller's task id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// The task entered a new phase.
    Status {
        task_id: String,
        status: TransferStatus,
    },
    /// Confirmed progress in percent, `[0, 100]`, non-decreasing per task.
    Progress { task_id: String, percent: f64 },
    /// The task finished and the server returned the created file.
    Completed {
        task_id: String,
        file: FileDescriptor,
    },
    /// The task failed.
    Failed {
        task_id: String,
        kind: ErrorKind,
        error: String,
    },
    /// The task was cancelled.
    Aborted { task_id: String },
    /// At least one file in a batch was created; listings should reload.
    Refresh,
    /// Summary of the files in a batch that did not succeed.
    BatchFailed { failures: Vec<IngestEntry> },
}

/// How one upload task ended.
#[derive(Debug)]
pub enum TerminalOutcome {
    Completed(FileDescriptor),
    Failed(UploadError),
    Aborted,
}

impl TerminalOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Failure kind, or `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(e) => Some(e.kind()),
            Self::Aborted => Some(ErrorKind::Cancelled),
        }
    }

    /// Terminal status matching this outcome.
    pub fn status(&self) -> TransferStatus {
        match self {
            Self::Completed(_) => TransferStatus::Completed,
            Self::Failed(_) => TransferStatus::Failed,
            Self::Aborted => TransferStatus::Aborted,
        }
    }
}

/// One file being moved to the remote store.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub session_key: String,
    pub file: SourceFile,
    pub destination: Option<i64>,
    pub status: TransferStatus,
    /// Set once negotiation succeeded; only then is there anything to abort.
    pub session_opened: bool,
}

impl TransferTask {
    pub fn new(session_key: String, file: SourceFile, destination: Option<i64>) -> Self {
        Self {
            session_key,
            file,
            destination,
            status: TransferStatus::Pending,
            session_opened: false,
        }
    }
}

/// Per-file result inside an ingest report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Success { file: FileDescriptor },
    Failure { kind: ErrorKind, reason: String },
    Aborted,
}

/// Result of ingesting one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestEntry {
    pub file_name: String,
    pub notification_id: String,
    #[serde(flatten)]
    pub outcome: IngestOutcome,
}

impl IngestEntry {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, IngestOutcome::Success { .. })
    }
}

/// Aggregate of an ingest batch. Entries are in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub successes: usize,
    /// Failed and aborted files.
    pub failures: usize,
    pub entries: Vec<IngestEntry>,
}

impl IngestReport {
    pub(crate) fn from_entries(entries: Vec<IngestEntry>) -> Self {
        let successes = entries.iter().filter(|e| e.is_success()).count();
        Self {
            successes,
            failures: entries.len() - successes,
            entries,
        }
    }

    /// Entries that did not succeed, in input order.
    pub fn failed_entries(&self) -> Vec<IngestEntry> {
        self.entries
            .iter()
            .filter(|e| !e.is_success())
            .cloned()
            .collect()
    }
}
