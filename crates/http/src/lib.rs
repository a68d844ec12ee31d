//! HTTP binding of the upload session API.
//!
//! [`HttpSessionApi`] implements [`skydrop_uploader::SessionApi`] with
//! `reqwest`, classifying every failure into the engine's error taxonomy.

pub mod client;
pub mod status;

pub use client::{Error, HttpSessionApi};
pub use status::{is_transient_status, status_error};
