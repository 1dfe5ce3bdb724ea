//! Browser adapter interface.
//!
//! The session core drives the page through this seam: DOM snapshots come
//! back as raw card markup, and network responses arrive over a channel so
//! every correlator decision stays on the single session task.

pub mod cdp;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// Re-export the CDP adapter
pub use cdp::CdpBrowser;

/// Raw markup for one candidate card container, in DOM order.
///
/// The scanner extracts everything it needs from these two strings; the
/// adapter does no parsing of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCardDom {
    /// Visible text of the container (`innerText`)
    pub text: String,

    /// Inner markup of the container (`innerHTML`)
    pub html: String,
}

/// One completed network response, body fully downloaded.
///
/// `completed_at` is stamped against the session clock when the body
/// finished downloading; responses that never complete are dropped by the
/// adapter and never reach the core.
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub completed_at: Duration,
}

/// Trait for browser-control backends.
#[async_trait]
pub trait BrowserSession: Send {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Start streaming completed responses. Called once, before navigation,
    /// so nothing loaded by the initial page view is missed.
    async fn subscribe_responses(&mut self) -> Result<mpsc::Receiver<NetworkResponse>>;

    /// Navigate to the ad-library URL and wait for the DOM to settle.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Scroll one step to trigger lazy loading of further cards.
    async fn scroll_step(&mut self) -> Result<()>;

    /// Snapshot the currently rendered card containers, top to bottom.
    async fn query_cards(&mut self) -> Result<Vec<RawCardDom>>;
}
