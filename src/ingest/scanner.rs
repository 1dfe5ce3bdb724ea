//! DOM snapshot scanner.
//!
//! Converts the raw card containers returned by the browser adapter into
//! ordered [`CardObservation`]s, one scan per scroll pass. Extraction leans
//! on visible text patterns instead of fragile class names; the
//! video-thumbnail indicator is a fall-through list of independent
//! detectors, swappable without touching correlation.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use tracing::debug;

use crate::adapters::RawCardDom;
use crate::core::clock::SessionClock;
use crate::domain::CardObservation;

fn library_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bLibrary ID:?\s*(\d+)\b").unwrap())
}

fn status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(Active|Inactive)\b").unwrap())
}

// e.g. "Started running on Oct 8, 2025 · Total active time 14 hrs"
fn started_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Started\s+running\s+on\s+([^\n·\-]+?)\s*[·\-]\s*Total\s+active\s+time\s*([^\n]+)")
            .unwrap()
    })
}

fn started_simple_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Started\s+running\s+on\s+([^\n]+)").unwrap())
}

// "Oct 8, 2024 - Nov 2, 2024" as rendered for inactive ads
fn date_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([A-Za-z]{3}\s+\d{1,2},\s+\d{4})\s*[-–—]\s*([A-Za-z]{3}\s+\d{1,2},\s+\d{4})")
            .unwrap()
    })
}

// "8 Oct 2024 - 2 Nov 2024" locale variant
fn date_range_alt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{1,2}\s+[A-Za-z]{3}\s+\d{4})\s*[-–—]\s*(\d{1,2}\s+[A-Za-z]{3}\s+\d{4})")
            .unwrap()
    })
}

fn duration_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^total\s+active\s+time\s*[:\-]*\s*").unwrap())
}

/// One independent video-thumbnail check. Detectors are tried in sequence;
/// the first hit flags the card.
pub type ThumbnailDetector = fn(&RawCardDom) -> bool;

/// Native `<video>` element inside the card.
fn detect_video_element(card: &RawCardDom) -> bool {
    card.html.to_ascii_lowercase().contains("<video")
}

/// Play-button overlay markers.
fn detect_play_button(card: &RawCardDom) -> bool {
    let html = card.html.to_ascii_lowercase();
    html.contains("play-button")
        || html.contains("playbutton")
        || html.contains("data-testid=\"play")
        || html.contains("aria-label=\"play")
}

/// Play-styled class or style attributes.
fn detect_play_styling(card: &RawCardDom) -> bool {
    let html = card.html.to_ascii_lowercase();
    html.contains("class=\"play") || html.contains("style=\"play")
}

/// Last-resort textual hints in the markup.
fn detect_video_hints(card: &RawCardDom) -> bool {
    let html = card.html.to_ascii_lowercase();
    html.contains(".mp4") || html.contains(".webm") || html.contains("video")
}

/// The default fall-through detector list, strongest signal first.
pub fn default_detectors() -> Vec<ThumbnailDetector> {
    vec![
        detect_video_element,
        detect_play_button,
        detect_play_styling,
        detect_video_hints,
    ]
}

/// Scanner for per-pass DOM snapshots.
pub struct CardScanner {
    clock: SessionClock,
    detectors: Vec<ThumbnailDetector>,
}

impl CardScanner {
    /// Create a scanner with the default detector list.
    pub fn new(clock: SessionClock) -> Self {
        Self::with_detectors(clock, default_detectors())
    }

    /// Create a scanner with a custom detector list.
    pub fn with_detectors(clock: SessionClock, detectors: Vec<ThumbnailDetector>) -> Self {
        Self { clock, detectors }
    }

    /// Scan one snapshot into ordered observations.
    ///
    /// Cards without a discoverable Library ID are dropped, and a Library ID
    /// appearing twice in the same snapshot is emitted once. Cross-pass
    /// dedup is the correlator registry's job.
    pub fn scan(&self, snapshot: &[RawCardDom]) -> Vec<CardObservation> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut observations = Vec::new();

        for card in snapshot {
            let Some(library_id) = extract_library_id(&card.text) else {
                continue;
            };
            if !seen.insert(library_id.clone()) {
                continue;
            }

            let fields = parse_card_text(&card.text);
            let has_video_thumbnail = self.detectors.iter().any(|detect| detect(card));

            debug!(
                %library_id,
                video = has_video_thumbnail,
                status = fields.status.as_deref().unwrap_or("-"),
                "Card scanned"
            );

            observations.push(CardObservation {
                library_id,
                status: fields.status,
                started_running: fields.started_running,
                total_active_time: fields.total_active_time,
                has_video_thumbnail,
                discovered_at: self.clock.now(),
            });
        }

        observations
    }
}

/// Text fields extracted from a card's visible text.
#[derive(Debug, Default)]
struct CardTextFields {
    status: Option<String>,
    started_running: Option<String>,
    total_active_time: Option<String>,
}

fn extract_library_id(text: &str) -> Option<String> {
    library_id_re()
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Parse status and date fields from card text.
///
/// Active ads render "Started running on <date> · Total active time <dur>";
/// inactive ads render a plain date range, from which the active time is
/// derived (inclusive of both endpoints). An active ad missing its duration
/// gets hours elapsed since the start date.
fn parse_card_text(text: &str) -> CardTextFields {
    let mut fields = CardTextFields::default();

    if let Some(caps) = status_re().captures(text) {
        let mut status = caps[1].to_ascii_lowercase();
        status[..1].make_ascii_uppercase();
        fields.status = Some(status);
    }

    if fields.status.as_deref() == Some("Inactive") {
        if let Some((start, end)) = extract_date_range(text) {
            fields.started_running = Some(format_date(start));
            fields.total_active_time = Some(humanize_days(
                (end - start).num_days().max(0) + 1, // inclusive
            ));
        }
    } else if let Some(caps) = started_re().captures(text) {
        let raw_date = caps[1].trim();
        fields.started_running = Some(
            parse_rendered_date(raw_date)
                .map(format_date)
                .unwrap_or_else(|| raw_date.to_string()),
        );
        let duration = duration_prefix_re().replace(caps[2].trim(), "");
        fields.total_active_time = Some(duration.trim().to_string());
    } else if let Some(caps) = started_simple_re().captures(text) {
        fields.started_running = Some(caps[1].trim().to_string());
    }

    // Active ad with a known start but no rendered duration
    if fields.status.as_deref() == Some("Active") && fields.total_active_time.is_none() {
        if let Some(start) = fields
            .started_running
            .as_deref()
            .and_then(parse_rendered_date)
        {
            let start_midnight = start.and_hms_opt(0, 0, 0).expect("midnight is valid");
            let hours = (Utc::now().naive_utc() - start_midnight).num_hours().max(1);
            fields.total_active_time = Some(format!("{} hrs", hours));
        }
    }

    fields
}

fn extract_date_range(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    if let Some(caps) = date_range_re().captures(text) {
        let start = parse_rendered_date(caps[1].trim())?;
        let end = parse_rendered_date(caps[2].trim())?;
        return Some((start, end));
    }
    if let Some(caps) = date_range_alt_re().captures(text) {
        let start = parse_rendered_date(caps[1].trim())?;
        let end = parse_rendered_date(caps[2].trim())?;
        return Some((start, end));
    }
    None
}

/// Parse a rendered date in any of the formats Facebook uses.
fn parse_rendered_date(raw: &str) -> Option<NaiveDate> {
    let cleaned: String = raw
        .replace('\u{00b7}', " ")
        .replace('\u{2009}', " ")
        .replace('\u{2013}', "-")
        .replace('\u{2014}', "-")
        .trim()
        .to_string();

    for candidate in [cleaned.as_str(), cleaned.split(" - ").next().unwrap_or("")] {
        for fmt in ["%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(candidate.trim(), fmt) {
                return Some(date);
            }
        }
    }
    None
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

/// Humanize a day count the way the rendered UI does.
fn humanize_days(days: i64) -> String {
    match days {
        i64::MIN..=0 => "less than 1 day".to_string(),
        1 => "1 day".to_string(),
        2..=6 => format!("{} days", days),
        7..=29 => {
            let weeks = days / 7;
            if weeks == 1 {
                "1 week".to_string()
            } else {
                format!("{} weeks", weeks)
            }
        }
        30..=364 => {
            let months = days / 30;
            if months == 1 {
                "1 month".to_string()
            } else {
                format!("{} months", months)
            }
        }
        _ => {
            let years = days / 365;
            if years == 1 {
                "1 year".to_string()
            } else {
                format!("{} years", years)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str, html: &str) -> RawCardDom {
        RawCardDom {
            text: text.to_string(),
            html: html.to_string(),
        }
    }

    #[test]
    fn test_extract_library_id() {
        assert_eq!(
            extract_library_id("Active\nLibrary ID: 123456789").as_deref(),
            Some("123456789")
        );
        assert_eq!(extract_library_id("Sponsored content"), None);
    }

    #[test]
    fn test_parse_active_card() {
        let fields = parse_card_text(
            "Active\nLibrary ID: 42\nStarted running on Oct 8, 2025 · Total active time 14 hrs",
        );
        assert_eq!(fields.status.as_deref(), Some("Active"));
        assert_eq!(fields.started_running.as_deref(), Some("08 Oct 2025"));
        assert_eq!(fields.total_active_time.as_deref(), Some("14 hrs"));
    }

    #[test]
    fn test_parse_inactive_date_range() {
        let fields = parse_card_text("Inactive\nLibrary ID: 42\nOct 1, 2024 - Oct 15, 2024");
        assert_eq!(fields.status.as_deref(), Some("Inactive"));
        assert_eq!(fields.started_running.as_deref(), Some("01 Oct 2024"));
        // 15 days inclusive -> 2 weeks
        assert_eq!(fields.total_active_time.as_deref(), Some("2 weeks"));
    }

    #[test]
    fn test_parse_inactive_alt_range() {
        let fields = parse_card_text("Inactive\nLibrary ID: 42\n1 Oct 2024 - 3 Oct 2024");
        assert_eq!(fields.started_running.as_deref(), Some("01 Oct 2024"));
        assert_eq!(fields.total_active_time.as_deref(), Some("3 days"));
    }

    #[test]
    fn test_humanize_days() {
        assert_eq!(humanize_days(0), "less than 1 day");
        assert_eq!(humanize_days(1), "1 day");
        assert_eq!(humanize_days(5), "5 days");
        assert_eq!(humanize_days(14), "2 weeks");
        assert_eq!(humanize_days(90), "3 months");
        assert_eq!(humanize_days(800), "2 years");
    }

    #[test]
    fn test_scan_drops_cards_without_library_id() {
        let scanner = CardScanner::new(SessionClock::start());
        let snapshot = vec![
            raw("Active\nLibrary ID: 1", "<div></div>"),
            raw("Sponsored", "<div></div>"),
        ];

        let observations = scanner.scan(&snapshot);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].library_id, "1");
    }

    #[test]
    fn test_scan_dedups_within_pass() {
        let scanner = CardScanner::new(SessionClock::start());
        let snapshot = vec![
            raw("Library ID: 7", "<div></div>"),
            raw("Library ID: 7", "<div></div>"),
        ];

        assert_eq!(scanner.scan(&snapshot).len(), 1);
    }

    #[test]
    fn test_video_detectors() {
        assert!(detect_video_element(&raw("", "<div><video src=\"x\"></video></div>")));
        assert!(detect_play_button(&raw("", "<div data-testid=\"play_button\"></div>")));
        assert!(detect_play_styling(&raw("", "<i class=\"playIcon\"></i>")));
        assert!(detect_video_hints(&raw("", "<img src=\"thumb.mp4.jpg\">")));
        assert!(!detect_video_element(&raw("", "<img src=\"a.jpg\">")));
    }

    #[test]
    fn test_scan_flags_video_cards() {
        let scanner = CardScanner::new(SessionClock::start());
        let snapshot = vec![
            raw("Library ID: 1", "<video poster=\"t.jpg\"></video>"),
            raw("Library ID: 2", "<img src=\"a.jpg\">"),
        ];

        let observations = scanner.scan(&snapshot);
        assert!(observations[0].has_video_thumbnail);
        assert!(!observations[1].has_video_thumbnail);
    }
}
