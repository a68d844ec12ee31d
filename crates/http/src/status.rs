//! Mapping of HTTP outcomes onto [`UploadError`].

use skydrop_protocol::ApiErrorBody;
use skydrop_uploader::UploadError;

/// Longest raw body quoted in an error message.
const MAX_REASON_LEN: usize = 200;

/// Statuses a retry may fix: 408, 429 and every 5xx.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// Builds the error for a non-2xx response.
///
/// The reason is taken from a `{detail}` / `{message}` body when present,
/// otherwise from the raw body text.
pub fn status_error(status: u16, body: &[u8]) -> UploadError {
    let reason = error_reason(status, body);
    if is_transient_status(status) {
        UploadError::Transient(format!("HTTP {status}: {reason}"))
    } else {
        UploadError::Rejected {
            status: Some(status),
            message: reason,
        }
    }
}

/// Maps a transport-level `reqwest` failure.
///
/// JSON is decoded outside reqwest, so its decode errors only come from a
/// body read cut short by the network and are transient like any other
/// dropped connection.
pub(crate) fn transport_error(e: reqwest::Error) -> UploadError {
    if e.is_builder() {
        UploadError::Protocol(e.to_string())
    } else {
        UploadError::Transient(e.to_string())
    }
}

fn error_reason(status: u16, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ApiErrorBody>(body)
        && let Some(reason) = parsed.reason()
    {
        return reason.to_string();
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return format!("HTTP {status}");
    }
    text.chars().take(MAX_REASON_LEN).collect()
}
