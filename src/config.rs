//! Scrape configuration.
//!
//! Configuration sources (highest priority first):
//! 1. CLI flags (applied by the caller)
//! 2. Environment variables (ADHARVEST_*)
//! 3. Config file (.adharvest/config.yaml)
//! 4. Defaults
//!
//! Config file discovery searches the current directory and parents for
//! `.adharvest/config.yaml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub scrape: ScrapeSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeSection {
    pub out_dir: Option<PathBuf>,
    pub max_cards: Option<usize>,
    pub max_scrolls: Option<u32>,
    pub drift_window_secs: Option<u64>,
    pub grace_period_secs: Option<u64>,
    pub scroll_settle_ms: Option<u64>,
    pub headless: Option<bool>,
}

/// Resolved scrape configuration.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Output directory for materialized media and the report
    pub out_dir: PathBuf,

    /// Hard cap on cards processed; reaching it triggers finalization
    pub max_cards: usize,

    /// Hard cap on scroll iterations
    pub max_scrolls: u32,

    /// Maximum |captured_at − discovered_at| for a windowed match
    pub drift_window: Duration,

    /// How long to drain in-flight responses at session end
    pub grace_period: Duration,

    /// Wait after each scroll step for lazy content to render
    pub scroll_settle: Duration,

    /// Run the browser headless
    pub headless: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("ad_media"),
            max_cards: 30,
            max_scrolls: 30,
            drift_window: Duration::from_secs(5),
            grace_period: Duration::from_secs(15),
            scroll_settle: Duration::from_millis(1500),
            headless: true,
        }
    }
}

impl ScrapeConfig {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let file = match find_config_file() {
            Some(path) => load_config_file(&path)?,
            None => ConfigFile::default(),
        };
        Ok(Self::from_sources(file))
    }

    /// Resolve one config-file layer plus environment overrides.
    fn from_sources(file: ConfigFile) -> Self {
        let defaults = Self::default();
        let section = file.scrape;

        let mut config = Self {
            out_dir: section.out_dir.unwrap_or(defaults.out_dir),
            max_cards: section.max_cards.unwrap_or(defaults.max_cards),
            max_scrolls: section.max_scrolls.unwrap_or(defaults.max_scrolls),
            drift_window: section
                .drift_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.drift_window),
            grace_period: section
                .grace_period_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace_period),
            scroll_settle: section
                .scroll_settle_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.scroll_settle),
            headless: section.headless.unwrap_or(defaults.headless),
        };

        if let Ok(dir) = std::env::var("ADHARVEST_OUT_DIR") {
            config.out_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_u64("ADHARVEST_DRIFT_WINDOW_SECS") {
            config.drift_window = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("ADHARVEST_GRACE_PERIOD_SECS") {
            config.grace_period = Duration::from_secs(secs);
        }

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".adharvest").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
