//! Session output surface consumed by the report writer.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Assignment, CardRecord, MatchKind};

/// One ad row in the report, keyed by Library ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdSummary {
    pub library_id: String,
    pub status: String,
    pub started_running: String,
    pub total_active_time: String,

    /// Materialized media path, absent for unfulfilled or image-only cards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_path: Option<PathBuf>,

    /// How the media was matched (windowed / reconciled), when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_match: Option<MatchKind>,
}

/// Full session report: per-ad rows in discovery order plus leftover counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub scraped_at: DateTime<Utc>,
    pub ads: Vec<AdSummary>,

    /// Video-flagged cards that ended without media
    pub unfulfilled_cards: usize,

    /// Captures that ended without a card
    pub discarded_captures: usize,
}

impl SessionReport {
    /// Assemble the report from the registry and the materialized
    /// assignments.
    pub fn assemble(
        session_id: Uuid,
        cards: impl Iterator<Item = CardRecord>,
        assignments: &HashMap<String, Assignment>,
        unfulfilled_cards: usize,
        discarded_captures: usize,
    ) -> Self {
        let ads = cards
            .map(|card| {
                let assignment = assignments.get(&card.library_id);
                AdSummary {
                    library_id: card.library_id,
                    status: card.status.unwrap_or_else(|| "Unknown".to_string()),
                    started_running: card
                        .started_running
                        .unwrap_or_else(|| "Unknown".to_string()),
                    total_active_time: card
                        .total_active_time
                        .unwrap_or_else(|| "Unknown".to_string()),
                    media_path: assignment.map(|a| a.video_path.clone()),
                    media_match: assignment.map(|a| a.kind),
                }
            })
            .collect();

        Self {
            session_id,
            scraped_at: Utc::now(),
            ads,
            unfulfilled_cards,
            discarded_captures,
        }
    }

    /// Compact console table, one row per ad.
    pub fn to_table(&self) -> String {
        let header = format!(
            "{:<18}  {:<8}  {:<20}  {}",
            "Library ID", "Status", "Started", "Total active time"
        );
        let mut out = format!("{}\n{}\n", header, "-".repeat(header.len()));
        for ad in &self.ads {
            out.push_str(&format!(
                "{:<18}  {:<8}  {:<20}  {}{}\n",
                ad.library_id,
                ad.status,
                ad.started_running,
                ad.total_active_time,
                match ad.media_path.as_ref() {
                    Some(path) => format!("  [{}]", path.display()),
                    None => String::new(),
                }
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(id: &str, video: bool) -> CardRecord {
        CardRecord {
            library_id: id.to_string(),
            status: Some("Active".to_string()),
            started_running: None,
            total_active_time: None,
            has_video_thumbnail: video,
            discovered_at: Duration::from_secs(1),
            sequence_index: 0,
        }
    }

    #[test]
    fn test_assemble_marks_media() {
        let mut assignments = HashMap::new();
        assignments.insert(
            "A".to_string(),
            Assignment {
                library_id: "A".to_string(),
                video_path: PathBuf::from("/out/A.mp4"),
                extension: "mp4".to_string(),
                kind: MatchKind::Windowed,
            },
        );

        let report = SessionReport::assemble(
            Uuid::new_v4(),
            vec![record("A", true), record("B", false)].into_iter(),
            &assignments,
            0,
            0,
        );

        assert_eq!(report.ads.len(), 2);
        assert_eq!(report.ads[0].media_path, Some(PathBuf::from("/out/A.mp4")));
        assert_eq!(report.ads[0].media_match, Some(MatchKind::Windowed));
        assert!(report.ads[1].media_path.is_none());
    }

    #[test]
    fn test_report_serializes() {
        let report = SessionReport::assemble(
            Uuid::new_v4(),
            vec![record("A", true)].into_iter(),
            &HashMap::new(),
            1,
            2,
        );

        let json = serde_json::to_string(&report).unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.unfulfilled_cards, 1);
        assert_eq!(parsed.discarded_captures, 2);
        // Absent media is omitted, not null
        assert!(!json.contains("media_path"));
    }
}
