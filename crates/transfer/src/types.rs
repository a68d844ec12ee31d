use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::TransferError;

/// A local file submitted for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Location on disk.
    pub path: PathBuf,
    /// Name used on the remote store.
    pub name: String,
    /// Size in bytes at submission time.
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch.
    pub modified_ms: i64,
    /// MIME type, if known.
    pub mime_type: Option<String>,
}

impl SourceFile {
    /// Stats `path` and captures name, size, mtime and MIME type.
    pub async fn from_path(path: &Path) -> Result<Self, TransferError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidFile(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Ok(Self {
            path: path.to_path_buf(),
            mime_type: detect_mime_type(&name),
            name,
            size: metadata.len(),
            modified_ms,
        })
    }
}

/// Guesses a MIME type from the file extension, case-insensitively.
pub fn detect_mime_type(name: &str) -> Option<String> {
    mime_guess::from_path(name).first().map(|m| m.to_string())
}

/// Lifecycle of one transfer task.
///
/// `Pending → Negotiating → Transferring → Finalizing → Completed`, with
/// `Failed` or `Aborted` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Negotiating,
    Transferring,
    Finalizing,
    Completed,
    Failed,
    Aborted,
}

impl TransferStatus {
    /// Returns `true` for `Completed`, `Failed` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn from_path_reads_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.TXT");
        std::fs::write(&path, b"hello").unwrap();

        let file = SourceFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "notes.TXT");
        assert_eq!(file.size, 5);
        assert!(file.modified_ms > 0);
        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn from_path_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let result = SourceFile::from_path(dir.path()).await;
        assert!(matches!(result, Err(TransferError::InvalidFile(_))));
    }

    #[tokio::test]
    async fn from_path_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = SourceFile::from_path(&dir.path().join("nope")).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[test]
    fn detect_mime_type_unknown() {
        assert_eq!(detect_mime_type("archive.qqzz"), None);
        assert_eq!(detect_mime_type("noext"), None);
        assert_eq!(detect_mime_type(""), None);
    }

    #[test]
    fn detect_mime_type_case_insensitive() {
        assert_eq!(detect_mime_type("MOVIE.MKV").as_deref(), Some("video/x-matroska"));
        assert_eq!(detect_mime_type("Photo.JPG").as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn detect_mime_type_office_and_ebook_formats() {
        assert_eq!(
            detect_mime_type("deck.pptx").as_deref(),
            Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")
        );
        assert_eq!(detect_mime_type("novel.epub").as_deref(), Some("application/epub+zip"));
    }

    #[tokio::test]
    async fn from_path_detects_presentation_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deck.pptx");
        std::fs::write(&path, b"PK").unwrap();

        let file = SourceFile::from_path(&path).await.unwrap();
        assert!(file.mime_type.is_some_and(|m| m.contains("presentationml")));
    }

    #[test]
    fn terminal_statuses() {
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
        assert!(TransferStatus::Aborted.is_terminal());
        assert!(!TransferStatus::Pending.is_terminal());
        assert!(!TransferStatus::Finalizing.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TransferStatus::Transferring).unwrap();
        assert_eq!(json, "\"transferring\"");
    }
}
