//! Video-to-card temporal correlation.
//!
//! The two producer streams share no identifier, so correlation leans on
//! weak temporal proximity: a capture belongs to the awaiting card whose
//! discovery time is nearest to the capture's completion time, within a
//! configurable drift window. Captures whose best candidate falls outside
//! the window stay pending until either a later scan pass introduces a
//! closer card or the end-of-session reconciliation pass relaxes the window.
//!
//! States per capture: Pending → Assigned | Discarded.
//! States per video-flagged card: AwaitingVideo → Matched | Unfulfilled.
//! Both are terminal after [`Correlator::finalize`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{CardObservation, CardRecord, MatchKind, VideoCapture};

/// A card/capture pairing decided by the correlator.
///
/// The capture still sits in temp storage at this point; the session layer
/// hands it to the materializer, which turns the decision into a final
/// [`crate::domain::Assignment`].
#[derive(Debug)]
pub struct MatchDecision {
    pub library_id: String,
    pub capture: VideoCapture,
    pub kind: MatchKind,
}

/// Leftovers settled by the reconciliation pass.
#[derive(Debug, Default)]
pub struct FinalizeSummary {
    /// Relaxed-window pairings, in capture order
    pub decisions: Vec<MatchDecision>,

    /// Captures with no card left to pair; their temp files need cleanup
    pub discarded: Vec<VideoCapture>,
}

/// Session-scoped correlation state machine.
///
/// Owned by the single session task; every decision sees a consistent view
/// of both streams, which is what makes nearest-timestamp matching sound.
pub struct Correlator {
    drift_window: Duration,

    /// Registry of every card seen this session, never removed
    cards: HashMap<String, CardRecord>,

    /// Library IDs in discovery order (index == sequence_index)
    order: Vec<String>,

    /// Cards that already received a capture
    matched: HashSet<String>,

    /// Captures not yet assigned or discarded
    pending: Vec<VideoCapture>,

    discarded_count: usize,
    finalized: bool,
}

impl Correlator {
    pub fn new(drift_window: Duration) -> Self {
        Self {
            drift_window,
            cards: HashMap::new(),
            order: Vec::new(),
            matched: HashSet::new(),
            pending: Vec::new(),
            discarded_count: 0,
            finalized: false,
        }
    }

    /// Fold one scan pass into the registry, then re-offer pending captures
    /// against any newly awaiting cards.
    ///
    /// Network completion can race ahead of DOM discovery (prefetch below
    /// the fold), so a capture may be waiting for the card that explains it;
    /// re-offering here keeps such matches inside the drift window instead
    /// of deferring them to reconciliation.
    pub fn observe_cards(&mut self, batch: Vec<CardObservation>) -> Vec<MatchDecision> {
        for obs in batch {
            match self.cards.get_mut(&obs.library_id) {
                Some(record) => {
                    record.merge(&obs);
                }
                None => {
                    let sequence_index = self.order.len() as u32;
                    debug!(
                        library_id = %obs.library_id,
                        sequence_index,
                        video = obs.has_video_thumbnail,
                        "Card discovered"
                    );
                    self.order.push(obs.library_id.clone());
                    self.cards.insert(
                        obs.library_id.clone(),
                        CardRecord::from_observation(obs, sequence_index),
                    );
                }
            }
        }

        self.rematch_pending()
    }

    /// Offer a freshly captured video for immediate matching.
    ///
    /// Returns a decision when an awaiting card lies within the drift
    /// window; otherwise the capture joins the pending queue.
    pub fn offer_capture(&mut self, capture: VideoCapture) -> Option<MatchDecision> {
        if self.finalized {
            // Terminal decisions are never reopened; a capture landing after
            // finalization goes straight to the discard set.
            warn!(capture_id = %capture.capture_id, "Capture arrived after finalization, discarding");
            self.discarded_count += 1;
            return None;
        }

        match self.best_candidate(capture.captured_at) {
            Some((library_id, delta)) if delta <= self.drift_window => {
                let library_id = library_id.to_string();
                self.matched.insert(library_id.clone());
                debug!(
                    capture_id = %capture.capture_id,
                    %library_id,
                    delta_ms = delta.as_millis() as u64,
                    "Capture matched"
                );
                Some(MatchDecision {
                    library_id,
                    capture,
                    kind: MatchKind::Windowed,
                })
            }
            _ => {
                debug!(
                    capture_id = %capture.capture_id,
                    pending = self.pending.len() + 1,
                    "No card within drift window, capture pending"
                );
                self.pending.push(capture);
                None
            }
        }
    }

    /// Settle all leftovers: greedy relaxed-window pairing, then terminal
    /// Discarded/Unfulfilled states. Idempotent; later calls return an
    /// empty summary.
    pub fn finalize(&mut self) -> FinalizeSummary {
        if self.finalized {
            return FinalizeSummary::default();
        }
        self.finalized = true;

        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|c| c.captured_at);

        // Awaiting cards in discovery order; no better signal will arrive,
        // and card load order correlates strongly with capture order for
        // same-viewport content.
        let awaiting: Vec<String> = self
            .order
            .iter()
            .filter(|id| self.is_awaiting(id))
            .cloned()
            .collect();

        let mut summary = FinalizeSummary::default();
        let mut slots = awaiting.into_iter();

        for capture in pending {
            match slots.next() {
                Some(library_id) => {
                    self.matched.insert(library_id.clone());
                    debug!(
                        capture_id = %capture.capture_id,
                        %library_id,
                        "Capture reconciled"
                    );
                    summary.decisions.push(MatchDecision {
                        library_id,
                        capture,
                        kind: MatchKind::Reconciled,
                    });
                }
                None => {
                    debug!(capture_id = %capture.capture_id, "Capture discarded");
                    summary.discarded.push(capture);
                }
            }
        }

        self.discarded_count += summary.discarded.len();

        let unfulfilled = self.unfulfilled_count();
        if unfulfilled > 0 || !summary.discarded.is_empty() {
            warn!(
                unfulfilled,
                discarded = summary.discarded.len(),
                "Reconciliation left unpaired items"
            );
        }

        summary
    }

    /// All registry records in discovery order.
    pub fn cards(&self) -> impl Iterator<Item = &CardRecord> {
        self.order.iter().map(|id| &self.cards[id])
    }

    pub fn card_count(&self) -> usize {
        self.order.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn discarded_count(&self) -> usize {
        self.discarded_count
    }

    /// Video-flagged cards that never received a capture.
    pub fn unfulfilled_count(&self) -> usize {
        self.order.iter().filter(|id| self.is_awaiting(id)).count()
    }

    pub fn is_matched(&self, library_id: &str) -> bool {
        self.matched.contains(library_id)
    }

    fn is_awaiting(&self, library_id: &str) -> bool {
        self.cards[library_id].has_video_thumbnail && !self.matched.contains(library_id)
    }

    /// Nearest awaiting card by |captured_at − discovered_at|, ties broken
    /// by smallest sequence index.
    fn best_candidate(&self, captured_at: Duration) -> Option<(&str, Duration)> {
        self.order
            .iter()
            .filter(|id| self.is_awaiting(id))
            .map(|id| {
                let card = &self.cards[id];
                (id.as_str(), abs_delta(captured_at, card.discovered_at))
            })
            .min_by_key(|(id, delta)| (*delta, self.cards[*id].sequence_index))
    }

    /// Re-offer pending captures, oldest first, under the normal window.
    fn rematch_pending(&mut self) -> Vec<MatchDecision> {
        if self.pending.is_empty() {
            return Vec::new();
        }

        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|c| c.captured_at);

        let mut decisions = Vec::new();
        for capture in pending {
            match self.best_candidate(capture.captured_at) {
                Some((library_id, delta)) if delta <= self.drift_window => {
                    let library_id = library_id.to_string();
                    self.matched.insert(library_id.clone());
                    debug!(
                        capture_id = %capture.capture_id,
                        %library_id,
                        delta_ms = delta.as_millis() as u64,
                        "Pending capture matched after scan"
                    );
                    decisions.push(MatchDecision {
                        library_id,
                        capture,
                        kind: MatchKind::Windowed,
                    });
                }
                _ => self.pending.push(capture),
            }
        }

        decisions
    }
}

fn abs_delta(a: Duration, b: Duration) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn card(id: &str, video: bool, at_secs: f64) -> CardObservation {
        CardObservation {
            library_id: id.to_string(),
            status: None,
            started_running: None,
            total_active_time: None,
            has_video_thumbnail: video,
            discovered_at: Duration::from_secs_f64(at_secs),
        }
    }

    fn capture(id: &str, at_secs: f64) -> VideoCapture {
        VideoCapture {
            capture_id: id.to_string(),
            temp_path: PathBuf::from(format!("/tmp/{id}.bin")),
            captured_at: Duration::from_secs_f64(at_secs),
            size_bytes: 1024,
            declared_content_type: Some("video/mp4".to_string()),
        }
    }

    #[test]
    fn test_nearest_card_wins() {
        let mut correlator = Correlator::new(Duration::from_secs(2));
        correlator.observe_cards(vec![card("A", true, 0.0), card("C", true, 5.0)]);

        let decision = correlator.offer_capture(capture("v1", 4.4)).unwrap();
        assert_eq!(decision.library_id, "C");
        assert_eq!(decision.kind, MatchKind::Windowed);
    }

    #[test]
    fn test_non_video_cards_never_match() {
        let mut correlator = Correlator::new(Duration::from_secs(2));
        correlator.observe_cards(vec![card("B", false, 1.0)]);

        assert!(correlator.offer_capture(capture("v1", 1.0)).is_none());
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_tie_breaks_by_sequence_index() {
        let mut correlator = Correlator::new(Duration::from_secs(5));
        correlator.observe_cards(vec![card("A", true, 1.0), card("B", true, 3.0)]);

        // Equidistant from both cards
        let decision = correlator.offer_capture(capture("v1", 2.0)).unwrap();
        assert_eq!(decision.library_id, "A");
    }

    #[test]
    fn test_outside_window_stays_pending() {
        let mut correlator = Correlator::new(Duration::from_secs(2));
        correlator.observe_cards(vec![card("A", true, 0.0)]);

        assert!(correlator.offer_capture(capture("v1", 10.0)).is_none());
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_card_is_matched_at_most_once() {
        let mut correlator = Correlator::new(Duration::from_secs(2));
        correlator.observe_cards(vec![card("A", true, 0.0)]);

        assert!(correlator.offer_capture(capture("v1", 0.5)).is_some());
        // Second capture has no awaiting card left
        assert!(correlator.offer_capture(capture("v2", 0.6)).is_none());
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_late_card_picks_up_pending_capture() {
        let mut correlator = Correlator::new(Duration::from_secs(2));

        // Capture races ahead of DOM discovery
        assert!(correlator.offer_capture(capture("v1", 6.0)).is_none());

        let decisions = correlator.observe_cards(vec![card("C", true, 5.0)]);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].library_id, "C");
        assert_eq!(decisions[0].kind, MatchKind::Windowed);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_finalize_pairs_leftovers_in_order() {
        let mut correlator = Correlator::new(Duration::from_secs(1));
        correlator.observe_cards(vec![card("A", true, 0.0), card("B", true, 2.0)]);

        // Both captures fall outside the 1s window of any card
        assert!(correlator.offer_capture(capture("v2", 30.0)).is_none());
        assert!(correlator.offer_capture(capture("v1", 20.0)).is_none());

        let summary = correlator.finalize();
        assert_eq!(summary.decisions.len(), 2);
        // Chronological captures against sequence-ordered cards
        assert_eq!(summary.decisions[0].capture.capture_id, "v1");
        assert_eq!(summary.decisions[0].library_id, "A");
        assert_eq!(summary.decisions[0].kind, MatchKind::Reconciled);
        assert_eq!(summary.decisions[1].capture.capture_id, "v2");
        assert_eq!(summary.decisions[1].library_id, "B");
        assert!(summary.discarded.is_empty());
        assert_eq!(correlator.unfulfilled_count(), 0);
    }

    #[test]
    fn test_finalize_discards_surplus_captures() {
        let mut correlator = Correlator::new(Duration::from_secs(2));
        correlator.observe_cards(vec![card("A", true, 0.0)]);

        assert!(correlator.offer_capture(capture("v1", 0.5)).is_some());
        assert!(correlator.offer_capture(capture("v2", 10.0)).is_none());

        let summary = correlator.finalize();
        assert!(summary.decisions.is_empty());
        assert_eq!(summary.discarded.len(), 1);
        assert_eq!(correlator.discarded_count(), 1);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_unfulfilled_card_reported() {
        let mut correlator = Correlator::new(Duration::from_secs(2));
        correlator.observe_cards(vec![card("A", true, 20.0)]);

        let summary = correlator.finalize();
        assert!(summary.decisions.is_empty());
        assert_eq!(correlator.unfulfilled_count(), 1);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut correlator = Correlator::new(Duration::from_secs(2));
        correlator.observe_cards(vec![card("A", true, 0.0)]);
        correlator.offer_capture(capture("v1", 50.0));

        let first = correlator.finalize();
        assert_eq!(first.decisions.len(), 1);

        let second = correlator.finalize();
        assert!(second.decisions.is_empty());
        assert!(second.discarded.is_empty());
    }

    #[test]
    fn test_capture_after_finalize_is_discarded() {
        let mut correlator = Correlator::new(Duration::from_secs(2));
        correlator.observe_cards(vec![card("A", true, 0.0)]);
        correlator.finalize();

        assert!(correlator.offer_capture(capture("late", 0.1)).is_none());
        assert_eq!(correlator.discarded_count(), 1);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_reobserved_card_merges_not_duplicates() {
        let mut correlator = Correlator::new(Duration::from_secs(2));
        correlator.observe_cards(vec![card("A", false, 0.0)]);
        correlator.observe_cards(vec![card("A", true, 4.0)]);

        assert_eq!(correlator.card_count(), 1);
        let record = correlator.cards().next().unwrap();
        assert!(record.has_video_thumbnail);
        // First sighting fixes the timestamp
        assert_eq!(record.discovered_at, Duration::from_secs(0));
    }
}
