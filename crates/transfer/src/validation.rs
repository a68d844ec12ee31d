use skydrop_protocol::constants::{SESSION_KEY_MAX_LEN, SESSION_KEY_MIN_LEN};

use crate::{SourceFile, TransferError};

/// Validates a file before any network call.
///
/// Rejects empty names and zero-length files; the server refuses both.
pub fn validate_source_file(file: &SourceFile) -> Result<(), TransferError> {
    if file.name.trim().is_empty() {
        return Err(TransferError::InvalidFile(format!(
            "empty file name: {}",
            file.path.display()
        )));
    }
    if file.size == 0 {
        return Err(TransferError::InvalidFile(format!(
            "zero-length file: {}",
            file.name
        )));
    }
    Ok(())
}

/// Validates a session key against the server's `^[A-Za-z0-9_-]{8,128}$`.
pub fn validate_session_key(key: &str) -> Result<(), TransferError> {
    let len = key.len();
    if !(SESSION_KEY_MIN_LEN..=SESSION_KEY_MAX_LEN).contains(&len) {
        return Err(TransferError::InvalidSessionKey(format!(
            "length {len} outside {SESSION_KEY_MIN_LEN}..={SESSION_KEY_MAX_LEN}: {key}"
        )));
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(TransferError::InvalidSessionKey(format!(
            "invalid character {c:?}: {key}"
        )));
    }
    Ok(())
}
