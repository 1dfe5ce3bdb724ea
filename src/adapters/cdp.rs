//! Chromium DevTools Protocol backend.
//!
//! Drives a real Chromium instance via chromiumoxide. Completed video-ish
//! responses are fetched with `Network.getResponseBody` and forwarded to
//! the session over a channel; responses whose body cannot be retrieved
//! (aborted, evicted, navigation flushed the cache) are dropped with a
//! warning and never reach the correlator.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::clock::SessionClock;
use crate::ingest::looks_like_video;

use super::{BrowserSession, NetworkResponse, RawCardDom};

/// Extra settle time after navigation before the first scan.
const NAVIGATION_SETTLE: Duration = Duration::from_secs(3);

/// JS snapshot of candidate card containers, DOM order preserved.
const QUERY_CARDS_JS: &str = r#"
Array.from(document.querySelectorAll("div[role='article'], article"))
    .filter(el => (el.innerText || "").includes("Library ID"))
    .map(el => ({ text: el.innerText, html: el.innerHTML }))
"#;

/// Chromium-backed browser session.
pub struct CdpBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
    clock: SessionClock,
    user_data_dir: Option<PathBuf>,
    cleanup_user_data_dir: bool,
}

impl CdpBrowser {
    /// Launch Chromium and open a blank page.
    ///
    /// Responses are stamped against `clock`, which must be the session's
    /// clock. Honors `CHROME_BIN` and `ADHARVEST_USER_DATA_DIR`.
    pub async fn launch(headless: bool, clock: SessionClock) -> Result<Self> {
        let mut config_builder = BrowserConfig::builder();
        config_builder = config_builder.no_sandbox(); // Often needed in docker/CI
        let (user_data_dir, cleanup_user_data_dir) = resolve_user_data_dir()?;
        config_builder = config_builder.user_data_dir(&user_data_dir);

        if !headless {
            info!("Launching browser in visible mode");
            config_builder = config_builder.with_head();
        } else {
            info!("Launching browser in headless mode");
        }

        if let Ok(chrome_bin) = std::env::var("CHROME_BIN") {
            info!("Using custom Chrome binary: {}", chrome_bin);
            config_builder = config_builder.chrome_executable(chrome_bin);
        }

        let (browser, mut handler) = Browser::launch(
            config_builder
                .build()
                .map_err(|e| anyhow!("Failed to build browser config: {}", e))?,
        )
        .await
        .context("Failed to launch browser")?;

        // Drive the CDP connection until the browser goes away
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    warn!("Browser handler error (ignoring): {}", e);
                }
            }
            debug!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create page")?;

        Ok(Self {
            browser,
            handler_task,
            page,
            clock,
            user_data_dir: Some(user_data_dir),
            cleanup_user_data_dir,
        })
    }

    /// Shut the browser down and clean up the profile dir.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await.context("Error closing browser")?;
        self.handler_task
            .await
            .context("Error awaiting handler task")?;

        if self.cleanup_user_data_dir {
            if let Some(dir) = &self.user_data_dir {
                if let Err(e) = std::fs::remove_dir_all(dir) {
                    debug!("Failed to clean up user-data-dir {}: {}", dir.display(), e);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BrowserSession for CdpBrowser {
    fn name(&self) -> &str {
        "cdp"
    }

    async fn subscribe_responses(&mut self) -> Result<mpsc::Receiver<NetworkResponse>> {
        self.page
            .execute(EnableParams::default())
            .await
            .context("Failed to enable network domain")?;

        let mut received = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("Failed to subscribe to response events")?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("Failed to subscribe to loading events")?;

        let (tx, rx) = mpsc::channel::<NetworkResponse>(100);
        let page = self.page.clone();
        let clock = self.clock;

        tokio::spawn(async move {
            // Video-ish requests whose body has not finished downloading yet
            let mut inflight: HashMap<RequestId, (String, Option<String>)> = HashMap::new();

            loop {
                tokio::select! {
                    event = received.next() => {
                        let Some(event) = event else { break };
                        let url = event.response.url.clone();
                        let mime = &event.response.mime_type;
                        let content_type = (!mime.is_empty()).then(|| mime.clone());
                        // Prefilter so we only pull bodies worth staging
                        if looks_like_video(&url, content_type.as_deref()) {
                            inflight.insert(event.request_id.clone(), (url, content_type));
                        }
                    }
                    event = finished.next() => {
                        let Some(event) = event else { break };
                        let Some((url, content_type)) = inflight.remove(&event.request_id) else {
                            continue;
                        };
                        let params = GetResponseBodyParams::new(event.request_id.clone());
                        let body = match page.execute(params).await {
                            Ok(resp) => {
                                if resp.result.base64_encoded {
                                    match BASE64.decode(resp.result.body.as_bytes()) {
                                        Ok(bytes) => bytes,
                                        Err(e) => {
                                            warn!(url = %url, error = %e, "Body decode failed, dropping");
                                            continue;
                                        }
                                    }
                                } else {
                                    resp.result.body.clone().into_bytes()
                                }
                            }
                            Err(e) => {
                                warn!(url = %url, error = %e, "Body fetch failed, dropping");
                                continue;
                            }
                        };

                        let response = NetworkResponse {
                            url,
                            content_type,
                            body,
                            completed_at: clock.now(),
                        };
                        if tx.send(response).await.is_err() {
                            break; // session gone
                        }
                    }
                }
            }
            debug!("Network listener task ended");
        });

        Ok(rx)
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        let _ = self.page.wait_for_navigation().await;
        tokio::time::sleep(NAVIGATION_SETTLE).await;

        // Zoom out so several cards are fully visible in predictable layout
        if let Err(e) = self
            .page
            .evaluate("document.documentElement.style.zoom='0.67'")
            .await
        {
            debug!("Zoom adjustment failed: {}", e);
        }

        Ok(())
    }

    async fn scroll_step(&mut self) -> Result<()> {
        self.page
            .evaluate("window.scrollBy(0, window.innerHeight)")
            .await
            .context("Scroll failed")?;
        Ok(())
    }

    async fn query_cards(&mut self) -> Result<Vec<RawCardDom>> {
        let cards: Vec<RawCardDom> = self
            .page
            .evaluate(QUERY_CARDS_JS)
            .await
            .context("Card snapshot failed")?
            .into_value()
            .context("Card snapshot returned unexpected shape")?;
        Ok(cards)
    }
}

fn resolve_user_data_dir() -> Result<(PathBuf, bool)> {
    if let Ok(dir) = std::env::var("ADHARVEST_USER_DATA_DIR") {
        let path = PathBuf::from(dir);
        std::fs::create_dir_all(&path)?;
        info!("Using user data dir from ADHARVEST_USER_DATA_DIR: {}", path.display());
        return Ok((path, false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock error")?
        .as_nanos();
    let unique = format!("adharvest-chromium-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    debug!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}
