//! adharvest - ad-library metadata and media scraper
//!
//! Extracts per-ad metadata and media from dynamically loaded ad-library
//! pages. The hard part is that video payloads arrive over the network
//! asynchronously and carry no identifier tying them to the DOM card that
//! triggered them, so the core is a temporal correlation engine:
//!
//! - Cards are discovered by scanning the DOM after each scroll step
//! - Video payloads are captured from network traffic as they complete
//! - The correlator pairs them by nearest timestamp inside a drift window,
//!   with a best-effort reconciliation pass at session end
//!
//! # Modules
//!
//! - `adapters`: browser backends (CDP)
//! - `core`: session driver, correlator, clock, report
//! - `domain`: data structures (CardRecord, VideoCapture, Assignment)
//! - `ingest`: the two producers (Card Scanner, Network Interceptor)
//! - `media`: container sniffing and materialization
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! adharvest run "<ad_library_url>" --out-dir ad_media --max-cards 30
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod media;

// Re-export main types at crate root for convenience
pub use adapters::{BrowserSession, NetworkResponse, RawCardDom};
pub use config::ScrapeConfig;
pub use core::{Correlator, ScrapeSession, SessionClock, SessionReport};
pub use domain::{Assignment, CardObservation, CardRecord, MatchKind, VideoCapture};
pub use media::{ContainerKind, MediaMaterializer};
