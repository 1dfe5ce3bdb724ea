//! Container format detection from payload headers.
//!
//! Inspects only the leading bytes of a payload. Pure and infallible: an
//! unrecognized header is an MP4 result, not an error, because Facebook's
//! CDN overwhelmingly serves fragmented MP4 and the extension only has to
//! be good enough for playback.

use serde::{Deserialize, Serialize};

/// Recognized video container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Mp4,
    Webm,
    Mov,
}

impl ContainerKind {
    /// File extension used when materializing media of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mov => "mov",
        }
    }
}

/// EBML magic that opens every Matroska/WebM stream.
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Detect the container format from the first bytes of a payload.
///
/// Recognizes ISO-BMFF via the `ftyp` box at offset 4 (QuickTime when the
/// major brand is `qt`), and WebM via the EBML magic. Everything else,
/// including headers shorter than a box, defaults to MP4.
pub fn detect(header: &[u8]) -> ContainerKind {
    if header.starts_with(&EBML_MAGIC) {
        return ContainerKind::Webm;
    }

    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        // Major brand sits right after the box type
        if &header[8..10] == b"qt" {
            return ContainerKind::Mov;
        }
        return ContainerKind::Mp4;
    }

    ContainerKind::Mp4
}
