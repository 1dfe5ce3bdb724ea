//! Correlation scenarios with synthetic timestamps.
//!
//! These exercise the matching rules end to end on the state machine
//! alone: drift-window selection, tie-breaks, reconciliation, and the
//! terminal-state guarantees.

use std::path::PathBuf;
use std::time::Duration;

use adharvest::core::Correlator;
use adharvest::domain::{CardObservation, MatchKind, VideoCapture};

fn card(id: &str, video: bool, at_secs: f64) -> CardObservation {
    CardObservation {
        library_id: id.to_string(),
        status: Some("Active".to_string()),
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
        size_bytes: 4096,
        declared_content_type: Some("video/mp4".to_string()),
    }
}

const WINDOW: Duration = Duration::from_secs(2);

#[test]
fn two_captures_land_on_their_cards() {
    let mut correlator = Correlator::new(WINDOW);
    correlator.observe_cards(vec![
        card("A", true, 0.0),
        card("B", false, 1.0),
        card("C", true, 5.0),
    ]);

    let first = correlator.offer_capture(capture("v1", 0.5)).unwrap();
    assert_eq!(first.library_id, "A");
    assert_eq!(first.kind, MatchKind::Windowed);

    let second = correlator.offer_capture(capture("v2", 5.2)).unwrap();
    assert_eq!(second.library_id, "C");
    assert_eq!(second.kind, MatchKind::Windowed);

    // B never had a video thumbnail and gets nothing
    let summary = correlator.finalize();
    assert!(summary.decisions.is_empty());
    assert_eq!(correlator.unfulfilled_count(), 0);
}

#[test]
fn capture_with_no_eligible_card_is_discarded() {
    let mut correlator = Correlator::new(WINDOW);
    correlator.observe_cards(vec![card("A", true, 0.0), card("C", true, 5.0)]);

    assert!(correlator.offer_capture(capture("v1", 0.5)).is_some());
    assert!(correlator.offer_capture(capture("v2", 5.2)).is_some());

    // Both cards are matched; nothing is within reach at t=10
    assert!(correlator.offer_capture(capture("v3", 10.0)).is_none());

    let summary = correlator.finalize();
    assert!(summary.decisions.is_empty());
    assert_eq!(summary.discarded.len(), 1);
    assert_eq!(summary.discarded[0].capture_id, "v3");
}

#[test]
fn late_card_ends_unfulfilled() {
    let mut correlator = Correlator::new(WINDOW);
    correlator.observe_cards(vec![card("A", true, 0.0)]);
    assert!(correlator.offer_capture(capture("v1", 0.5)).is_some());

    // Card discovered long after every capture has been assigned
    let decisions = correlator.observe_cards(vec![card("Z", true, 20.0)]);
    assert!(decisions.is_empty());

    let summary = correlator.finalize();
    assert!(summary.decisions.is_empty());
    assert_eq!(correlator.unfulfilled_count(), 1);
}

#[test]
fn every_capture_reaches_exactly_one_terminal_state() {
    let mut correlator = Correlator::new(WINDOW);
    correlator.observe_cards(vec![
        card("A", true, 0.0),
        card("B", true, 3.0),
        card("C", false, 4.0),
    ]);

    let offered = [
        capture("v1", 0.2),
        capture("v2", 2.9),
        capture("v3", 50.0),
        capture("v4", 51.0),
    ];

    let mut assigned = 0;
    for cap in offered {
        if correlator.offer_capture(cap).is_some() {
            assigned += 1;
        }
    }

    let summary = correlator.finalize();
    let reconciled = summary.decisions.len();
    let discarded = summary.discarded.len();

    // 4 captures in, 4 terminal decisions out, nothing pending
    assert_eq!(assigned + reconciled + discarded, 4);
    assert_eq!(correlator.pending_count(), 0);
}

#[test]
fn windowed_matches_respect_the_drift_window() {
    let mut correlator = Correlator::new(WINDOW);
    let cards = vec![card("A", true, 0.0), card("B", true, 10.0)];
    let discovery: Vec<(String, Duration)> = cards
        .iter()
        .map(|c| (c.library_id.clone(), c.discovered_at))
        .collect();
    correlator.observe_cards(cards);

    for (i, at) in [0.5, 9.0, 30.0].into_iter().enumerate() {
        if let Some(decision) = correlator.offer_capture(capture(&format!("v{i}"), at)) {
            let discovered = discovery
                .iter()
                .find(|(id, _)| *id == decision.library_id)
                .map(|(_, t)| *t)
                .unwrap();
            let delta = if decision.capture.captured_at > discovered {
                decision.capture.captured_at - discovered
            } else {
                discovered - decision.capture.captured_at
            };
            assert!(delta <= WINDOW, "windowed match outside drift window");
            assert_eq!(decision.kind, MatchKind::Windowed);
        }
    }

    // Whatever is left can only be settled as Reconciled
    for decision in correlator.finalize().decisions {
        assert_eq!(decision.kind, MatchKind::Reconciled);
    }
}

#[test]
fn no_library_id_is_assigned_twice() {
    let mut correlator = Correlator::new(Duration::from_secs(100));
    correlator.observe_cards(vec![card("A", true, 0.0), card("B", true, 1.0)]);

    let mut seen = std::collections::HashSet::new();
    for i in 0..4 {
        if let Some(decision) = correlator.offer_capture(capture(&format!("v{i}"), 0.1)) {
            assert!(seen.insert(decision.library_id.clone()), "duplicate assignment");
        }
    }
    for decision in correlator.finalize().decisions {
        assert!(seen.insert(decision.library_id.clone()), "duplicate assignment");
    }
}

#[test]
fn reconciliation_pairs_chronological_captures_with_ordered_cards() {
    let mut correlator = Correlator::new(Duration::from_millis(100));
    correlator.observe_cards(vec![
        card("first", true, 0.0),
        card("second", true, 1.0),
        card("third", true, 2.0),
    ]);

    // All captures far outside the window, offered out of order
    assert!(correlator.offer_capture(capture("late", 60.0)).is_none());
    assert!(correlator.offer_capture(capture("early", 40.0)).is_none());

    let summary = correlator.finalize();
    assert_eq!(summary.decisions.len(), 2);
    assert_eq!(summary.decisions[0].capture.capture_id, "early");
    assert_eq!(summary.decisions[0].library_id, "first");
    assert_eq!(summary.decisions[1].capture.capture_id, "late");
    assert_eq!(summary.decisions[1].library_id, "second");
    assert_eq!(correlator.unfulfilled_count(), 1); // "third"
}
