//! Expands user-supplied paths into uploadable files.
//!
//! Directories are walked recursively; the files found in each are sorted
//! by path so batches are reproducible.

use std::path::{Path, PathBuf};

use skydrop_transfer::SourceFile;
use tracing::debug;

use crate::error::UploadError;

/// Resolves `paths` into source files, in argument order.
pub async fn scan_sources(paths: &[PathBuf]) -> Result<Vec<SourceFile>, UploadError> {
    let mut found = Vec::new();
    for path in paths {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.is_dir() {
            let mut nested = Vec::new();
            walk_dir(path, &mut nested)?;
            nested.sort();
            debug!(dir = %path.display(), files = nested.len(), "scanned directory");
            found.extend(nested);
        } else {
            found.push(path.clone());
        }
    }

    let mut files = Vec::with_capacity(found.len());
    for path in found {
        files.push(SourceFile::from_path(&path).await?);
    }
    Ok(files)
}

fn walk_dir(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), UploadError> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(&path, files)?;
        } else if metadata.is_file() {
            files.push(path);
        }
    }
    Ok(())
}
