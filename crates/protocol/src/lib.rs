//! Wire types for the remote upload session API.
//!
//! Requests and responses are plain JSON except for chunk and direct sends,
//! which are multipart forms whose field names live in [`constants`].

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{ChunkAck, CompleteRequest, NegotiateRequest, SessionDescriptor};
pub use types::{ApiErrorBody, FileDescriptor};
