//! Terminal card/video pairings produced by the correlator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a match was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Nearest-timestamp match inside the drift window
    Windowed,

    /// Produced by the end-of-session reconciliation pass (window relaxed)
    Reconciled,
}

/// An immutable card/video pairing with the media already materialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// The card's Library ID
    pub library_id: String,

    /// Final, permanent media path (`{library_id}.{extension}`)
    pub video_path: PathBuf,

    /// Extension derived from the payload header (mp4 / webm / mov)
    pub extension: String,

    /// Whether the match was windowed or reconciled
    pub kind: MatchKind,
}
