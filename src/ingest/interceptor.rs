//! Network response interception.
//!
//! A pure producer: it knows nothing about cards. Each completed response
//! is filtered for video payloads, staged to the session temp dir, and
//! emitted as a [`VideoCapture`] stamped with its completion time. Corrupt
//! (empty) bodies and duplicate payloads are dropped before they can enter
//! the correlator's pending queue.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::adapters::NetworkResponse;
use crate::domain::VideoCapture;

/// Errors that can occur while staging a capture.
#[derive(Debug, Error)]
pub enum InterceptorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Content-type families that mark a response as video.
const VIDEO_MIME_FAMILIES: [&str; 3] = ["video/", "application/vnd.apple.mpegurl", "application/x-mpegurl"];

// URL fallback for CDNs that mislabel the content type
fn video_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\.(mp4|webm|mov|m3u8)([?#]|$)").unwrap())
}

/// Whether a response looks like a video payload, by declared content type
/// or by URL pattern.
pub fn looks_like_video(url: &str, content_type: Option<&str>) -> bool {
    if let Some(ctype) = content_type {
        let ctype = ctype.to_ascii_lowercase();
        if VIDEO_MIME_FAMILIES.iter().any(|family| ctype.starts_with(family)) {
            return true;
        }
    }
    video_url_re().is_match(url)
}

/// Why a response was not captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Not a video payload
    NotVideo,

    /// Body unreadable or zero-length
    Corrupt,

    /// Same payload bytes already captured this session
    Duplicate,
}

/// Outcome of offering one response to the interceptor.
#[derive(Debug)]
pub enum CaptureOutcome {
    Captured(VideoCapture),
    Rejected(Rejection),
}

impl CaptureOutcome {
    pub fn into_capture(self) -> Option<VideoCapture> {
        match self {
            Self::Captured(capture) => Some(capture),
            Self::Rejected(_) => None,
        }
    }
}

/// Stages video payloads from network traffic into a temp directory.
pub struct NetworkInterceptor {
    staging_dir: PathBuf,
    seen_hashes: HashSet<String>,
}

impl NetworkInterceptor {
    /// Create an interceptor staging into the given directory. The caller
    /// (the session) owns the directory's lifetime.
    pub fn new(staging_dir: PathBuf) -> Self {
        Self {
            staging_dir,
            seen_hashes: HashSet::new(),
        }
    }

    /// Offer one completed response.
    ///
    /// Returns `Captured` with a staged [`VideoCapture`], or `Rejected` with
    /// the reason. Only staging IO can fail.
    pub async fn process(
        &mut self,
        response: NetworkResponse,
    ) -> Result<CaptureOutcome, InterceptorError> {
        if !looks_like_video(&response.url, response.content_type.as_deref()) {
            return Ok(CaptureOutcome::Rejected(Rejection::NotVideo));
        }

        if response.body.is_empty() {
            warn!(url = %truncate(&response.url), "Dropping empty video payload");
            return Ok(CaptureOutcome::Rejected(Rejection::Corrupt));
        }

        let capture_id = payload_hash(&response.body);
        if !self.seen_hashes.insert(capture_id.clone()) {
            debug!(%capture_id, "Dropping duplicate video payload");
            return Ok(CaptureOutcome::Rejected(Rejection::Duplicate));
        }

        fs::create_dir_all(&self.staging_dir).await?;
        let temp_path = self.staging_dir.join(format!("cap_{}.bin", capture_id));
        fs::write(&temp_path, &response.body).await?;

        debug!(
            %capture_id,
            bytes = response.body.len(),
            at_ms = response.completed_at.as_millis() as u64,
            "Video payload staged"
        );

        Ok(CaptureOutcome::Captured(VideoCapture {
            capture_id,
            temp_path,
            captured_at: response.completed_at,
            size_bytes: response.body.len() as u64,
            declared_content_type: response.content_type,
        }))
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }
}

/// Content hash of a payload (sha256, first 12 hex chars).
pub fn payload_hash(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())[..12].to_string()
}

fn truncate(url: &str) -> &str {
    url.get(..80).unwrap_or(url)
}
