//! Domain types for the scraper core.
//!
//! This module contains the core data structures:
//! - Card: ad entries discovered in the DOM, keyed by Library ID
//! - Capture: video payloads saved from network traffic
//! - Assignment: terminal card/video pairings

pub mod assignment;
pub mod card;
pub mod capture;

// Re-export commonly used types
pub use assignment::{Assignment, MatchKind};
pub use card::{CardObservation, CardRecord};
pub use capture::VideoCapture;
