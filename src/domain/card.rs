//! Ad card records keyed by Library ID.
//!
//! A card is one ad entry discovered in the DOM. Cards enter the system as
//! [`CardObservation`]s produced by the scanner (one per scroll pass) and are
//! folded into the correlator's registry as [`CardRecord`]s. Records are
//! merged on re-observation, never deleted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single sighting of a card during one scan pass.
///
/// Observations carry everything the scanner could extract from the card's
/// text and markup. Ordering within a pass follows DOM (top-to-bottom) order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardObservation {
    /// The Library ID Facebook assigns to the ad (unique key)
    pub library_id: String,

    /// Display status as rendered ("Active" / "Inactive")
    pub status: Option<String>,

    /// "Started running on ..." date string as rendered
    pub started_running: Option<String>,

    /// Total active time as rendered or derived (e.g. "14 hrs", "3 weeks")
    pub total_active_time: Option<String>,

    /// Whether any thumbnail detector fired for this card
    pub has_video_thumbnail: bool,

    /// Session-relative time of this sighting
    pub discovered_at: Duration,
}

/// A card in the session registry.
///
/// `discovered_at` and `sequence_index` are fixed by the first observation;
/// later sightings of the same Library ID only enrich the metadata fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRecord {
    pub library_id: String,
    pub status: Option<String>,
    pub started_running: Option<String>,
    pub total_active_time: Option<String>,
    pub has_video_thumbnail: bool,
    pub discovered_at: Duration,

    /// Global discovery position, monotonic across scan passes.
    /// Used as the tie-break ordering for correlation.
    pub sequence_index: u32,
}

impl CardRecord {
    /// Build a registry record from the first observation of a Library ID.
    pub fn from_observation(obs: CardObservation, sequence_index: u32) -> Self {
        Self {
            library_id: obs.library_id,
            status: obs.status,
            started_running: obs.started_running,
            total_active_time: obs.total_active_time,
            has_video_thumbnail: obs.has_video_thumbnail,
            discovered_at: obs.discovered_at,
            sequence_index,
        }
    }

    /// Merge a re-observation into this record.
    ///
    /// Non-empty fields win over empty ones and the video flag is sticky:
    /// a later pass may see the card with its lazy thumbnail loaded, but a
    /// pass that no longer sees it does not un-flag the card.
    pub fn merge(&mut self, obs: &CardObservation) {
        debug_assert_eq!(self.library_id, obs.library_id);

        if self.status.is_none() {
            self.status = obs.status.clone();
        }
        if self.started_running.is_none() {
            self.started_running = obs.started_running.clone();
        }
        if self.total_active_time.is_none() {
            self.total_active_time = obs.total_active_time.clone();
        }
        self.has_video_thumbnail |= obs.has_video_thumbnail;
    }
}
