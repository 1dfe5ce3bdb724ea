//! Scrape session driver.
//!
//! Owns the single cooperative control flow: scroll passes and network
//! drains interleave on one task, so the correlator always sees a
//! consistent view of both streams and no locking is needed. Per-item
//! failures (bad payloads, materialize errors) are logged and absorbed;
//! only browser-adapter failures abort the session.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{BrowserSession, NetworkResponse};
use crate::config::ScrapeConfig;
use crate::domain::Assignment;
use crate::ingest::{CaptureOutcome, CardScanner, NetworkInterceptor};
use crate::media::{MediaMaterializer, MaterializeError};

use super::clock::SessionClock;
use super::correlator::{Correlator, MatchDecision};
use super::report::SessionReport;

/// One scrape session against one ad-library URL.
pub struct ScrapeSession {
    config: ScrapeConfig,
    clock: SessionClock,
    session_id: Uuid,
}

impl ScrapeSession {
    /// Create a session. The clock must be the same one the browser
    /// adapter stamps responses with, or drift comparisons are meaningless.
    pub fn new(config: ScrapeConfig, clock: SessionClock) -> Self {
        Self {
            config,
            clock,
            session_id: Uuid::new_v4(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Drive the full session: navigate, scroll/scan/drain until a cap is
    /// hit, grace-drain in-flight responses, reconcile, and report.
    #[instrument(skip(self, browser), fields(session_id = %self.session_id))]
    pub async fn run(
        &self,
        browser: &mut dyn BrowserSession,
        url: &str,
    ) -> Result<SessionReport> {
        info!(url, backend = browser.name(), "Starting scrape session");

        let staging = tempfile::tempdir().context("Failed to create staging dir")?;

        let mut state = SessionState {
            scanner: CardScanner::new(self.clock),
            interceptor: NetworkInterceptor::new(staging.path().to_path_buf()),
            correlator: Correlator::new(self.config.drift_window),
            materializer: MediaMaterializer::new(self.config.out_dir.clone()),
            assignments: HashMap::new(),
            materialize_failures: 0,
        };

        // Subscribe before navigating so the initial page load is captured
        let mut responses = browser
            .subscribe_responses()
            .await
            .context("Failed to subscribe to network responses")?;

        browser.navigate(url).await.context("Navigation failed")?;

        for pass in 0..self.config.max_scrolls {
            state.drain_ready(&mut responses).await;

            let snapshot = browser
                .query_cards()
                .await
                .with_context(|| format!("DOM query failed on pass {}", pass))?;
            let observations = state.scanner.scan(&snapshot);
            let decisions = state.correlator.observe_cards(observations);
            state.apply_decisions(decisions).await;

            if state.correlator.card_count() >= self.config.max_cards {
                info!(
                    cards = state.correlator.card_count(),
                    pass, "Card cap reached, finalizing"
                );
                break;
            }

            browser
                .scroll_step()
                .await
                .with_context(|| format!("Scroll failed on pass {}", pass))?;
            sleep(self.config.scroll_settle).await;
        }

        // Let in-flight downloads land before reconciling
        state
            .grace_drain(&mut responses, self.config.grace_period)
            .await;

        let summary = state.correlator.finalize();
        state.apply_decisions(summary.decisions).await;

        for capture in &summary.discarded {
            if let Err(e) = tokio::fs::remove_file(&capture.temp_path).await {
                debug!(capture_id = %capture.capture_id, error = %e, "Discard cleanup failed");
            }
        }

        let report = SessionReport::assemble(
            self.session_id,
            state.correlator.cards().cloned(),
            &state.assignments,
            state.correlator.unfulfilled_count(),
            state.correlator.discarded_count(),
        );

        info!(
            cards = report.ads.len(),
            with_media = state.assignments.len(),
            unfulfilled = report.unfulfilled_cards,
            discarded = report.discarded_captures,
            materialize_failures = state.materialize_failures,
            "Session complete"
        );

        // Dropping `staging` removes any partial or leftover temp files
        Ok(report)
    }
}

/// Mutable per-session state, kept off the public surface.
struct SessionState {
    scanner: CardScanner,
    interceptor: NetworkInterceptor,
    correlator: Correlator,
    materializer: MediaMaterializer,
    assignments: HashMap<String, Assignment>,
    materialize_failures: usize,
}

impl SessionState {
    /// Drain every response already sitting in the channel, without waiting.
    async fn drain_ready(&mut self, responses: &mut mpsc::Receiver<NetworkResponse>) {
        while let Ok(response) = responses.try_recv() {
            self.handle_response(response).await;
        }
    }

    /// Keep draining until the grace period elapses or the channel closes.
    async fn grace_drain(
        &mut self,
        responses: &mut mpsc::Receiver<NetworkResponse>,
        grace: std::time::Duration,
    ) {
        let deadline = Instant::now() + grace;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, responses.recv()).await {
                Ok(Some(response)) => self.handle_response(response).await,
                Ok(None) | Err(_) => break,
            }
        }
    }

    async fn handle_response(&mut self, response: NetworkResponse) {
        match self.interceptor.process(response).await {
            Ok(CaptureOutcome::Captured(capture)) => {
                if let Some(decision) = self.correlator.offer_capture(capture) {
                    self.apply_decision(decision).await;
                }
            }
            Ok(CaptureOutcome::Rejected(_)) => {}
            Err(e) => warn!(error = %e, "Failed to stage capture"),
        }
    }

    async fn apply_decisions(&mut self, decisions: Vec<MatchDecision>) {
        for decision in decisions {
            self.apply_decision(decision).await;
        }
    }

    /// Materialize one match. Failure leaves the card without media and the
    /// session running.
    async fn apply_decision(&mut self, decision: MatchDecision) {
        let MatchDecision {
            library_id,
            capture,
            kind,
        } = decision;

        match self
            .materializer
            .materialize(&library_id, &capture.temp_path)
            .await
        {
            Ok((video_path, container)) => {
                debug!(%library_id, path = %video_path.display(), "Assignment materialized");
                self.assignments.insert(
                    library_id.clone(),
                    Assignment {
                        library_id,
                        video_path,
                        extension: container.extension().to_string(),
                        kind,
                    },
                );
            }
            Err(e @ MaterializeError::TargetConflict(_)) => {
                warn!(%library_id, error = %e, "Materialize conflict, card reported without media");
                self.materialize_failures += 1;
            }
            Err(e) => {
                warn!(%library_id, error = %e, "Materialize failed, card reported without media");
                self.materialize_failures += 1;
            }
        }
    }
}
