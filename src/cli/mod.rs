//! Command-line interface for adharvest.
//!
//! Provides the scrape command plus a config inspection helper. The CLI
//! owns everything the core excludes: argument parsing, report
//! serialization to disk, and console presentation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::CdpBrowser;
use crate::config::ScrapeConfig;
use crate::core::{ScrapeSession, SessionClock, SessionReport};

/// adharvest - ad-library metadata and media scraper
#[derive(Parser, Debug)]
#[command(name = "adharvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scrape an ad-library URL
    Run {
        /// Ad Library URL to scrape
        url: String,

        /// Output directory for media and the JSON report
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Maximum number of cards to process
        #[arg(long)]
        max_cards: Option<usize>,

        /// Number of scroll iterations to load more ads
        #[arg(long)]
        scrolls: Option<u32>,

        /// Maximum seconds between card discovery and video capture
        /// for a match
        #[arg(long)]
        drift_window_secs: Option<u64>,

        /// Seconds to wait for in-flight downloads at session end
        #[arg(long)]
        grace_period_secs: Option<u64>,

        /// Run the browser with a visible window
        #[arg(long)]
        visible: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                url,
                out_dir,
                max_cards,
                scrolls,
                drift_window_secs,
                grace_period_secs,
                visible,
            } => {
                let mut config = ScrapeConfig::load()?;
                if let Some(dir) = out_dir {
                    config.out_dir = dir;
                }
                if let Some(n) = max_cards {
                    config.max_cards = n;
                }
                if let Some(n) = scrolls {
                    config.max_scrolls = n;
                }
                if let Some(secs) = drift_window_secs {
                    config.drift_window = std::time::Duration::from_secs(secs);
                }
                if let Some(secs) = grace_period_secs {
                    config.grace_period = std::time::Duration::from_secs(secs);
                }
                if visible {
                    config.headless = false;
                }

                run_scrape(config, &url).await
            }

            Commands::Config => {
                let config = ScrapeConfig::load()?;
                println!("{:#?}", config);
                Ok(())
            }
        }
    }
}

async fn run_scrape(config: ScrapeConfig, url: &str) -> Result<()> {
    let clock = SessionClock::start();
    let mut browser = CdpBrowser::launch(config.headless, clock)
        .await
        .context("Browser launch failed")?;

    let session = ScrapeSession::new(config.clone(), clock);
    let result = session.run(&mut browser, url).await;

    // Close the browser even when the session failed
    if let Err(e) = browser.close().await {
        tracing::warn!("Browser shutdown failed: {}", e);
    }

    let report = result?;
    write_report(&config.out_dir, &report)?;

    print!("{}", report.to_table());
    println!(
        "\nSaved {} ads to: {}",
        report.ads.len(),
        config.out_dir.display()
    );
    println!(
        "Unfulfilled cards: {}  Discarded captures: {}",
        report.unfulfilled_cards, report.discarded_captures
    );
    println!(
        "Time of scraping: {}",
        report.scraped_at.format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}

fn write_report(out_dir: &std::path::Path, report: &SessionReport) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let path = out_dir.join("ads_summary.json");
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
