//! Core session logic.
//!
//! This module contains:
//! - SessionClock: monotonic session-relative timestamps
//! - Correlator: the video-to-card matching state machine
//! - ScrapeSession: the cooperative session driver
//! - SessionReport: the output surface

pub mod clock;
pub mod correlator;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use clock::SessionClock;
pub use correlator::{Correlator, FinalizeSummary, MatchDecision};
pub use report::{AdSummary, SessionReport};
pub use session::ScrapeSession;
