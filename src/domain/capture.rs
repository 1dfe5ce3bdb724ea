//! Captured video payloads awaiting correlation.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A video payload observed on the network and staged to a temp file.
///
/// Each capture is consumed by the correlator at most once: it is either
/// assigned to exactly one card or moved to the discard set, and never
/// revisited after that terminal decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCapture {
    /// Content hash of the payload (sha256, 12 hex chars)
    pub capture_id: String,

    /// Staging location, owned by the interceptor until the materializer
    /// takes it over (or cleanup deletes it)
    pub temp_path: PathBuf,

    /// Session-relative time at which the payload finished downloading
    pub captured_at: Duration,

    /// Payload size in bytes
    pub size_bytes: u64,

    /// Content-Type header the server declared, if any
    pub declared_content_type: Option<String>,
}
