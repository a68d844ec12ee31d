use std::time::Duration;

/// Default base URL of the file service API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Negotiates (or resumes) a chunked upload session.
pub const PATH_MULTIPART_INIT: &str = "/files/multipart/init";

/// Accepts one chunk of a session.
pub const PATH_MULTIPART_CHUNK: &str = "/files/multipart/chunk";

/// Assembles all persisted chunks into a file.
pub const PATH_MULTIPART_COMPLETE: &str = "/files/multipart/complete";

/// Session status (`GET`) and abort (`DELETE`), suffixed with `/{upload_id}`.
pub const PATH_MULTIPART_SESSION: &str = "/files/multipart";

/// Single-request upload for small files.
pub const PATH_DIRECT_UPLOAD: &str = "/files";

/// Multipart form field carrying the session key on chunk sends.
pub const FIELD_UPLOAD_ID: &str = "upload_id";

/// Multipart form field carrying the zero-based chunk index.
pub const FIELD_CHUNK_INDEX: &str = "chunk_index";

/// Multipart file part holding chunk bytes.
pub const FIELD_CHUNK: &str = "chunk";

/// Multipart file part holding the whole file on direct sends.
pub const FIELD_FILE: &str = "file";

/// Multipart form field carrying the destination folder on direct sends.
pub const FIELD_PARENT_ID: &str = "parent_id";

/// Minimum accepted session key length.
pub const SESSION_KEY_MIN_LEN: usize = 8;

/// Maximum accepted session key length.
pub const SESSION_KEY_MAX_LEN: usize = 128;

/// Chunk size the server falls back to when the client requests none (2 MiB).
pub const SERVER_DEFAULT_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// Connect timeout for API requests. Request bodies themselves are not
/// time-limited because chunk and direct sends can be arbitrarily slow.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the chunk part filename the server expects: `<name>.part<index>`.
pub fn chunk_part_name(filename: &str, index: u32) -> String {
    format!("{filename}.part{index}")
}
