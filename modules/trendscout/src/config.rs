use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::collect::CollectOptions;
use crate::digitizer::SignalThresholds;

/// Secrets and environment-specific values, loaded from the environment
/// (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Browser
    pub chrome_ws_url: Option<String>,
    pub chrome_headless: bool,

    // Output
    pub output_dir: PathBuf,

    // Enrichment APIs
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub bing_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            chrome_ws_url: non_empty_env("CHROME_WS_URL"),
            chrome_headless: std::env::var("CHROME_HEADLESS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            output_dir: std::env::var("HARVEST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            spotify_client_id: non_empty_env("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_env("SPOTIFY_CLIENT_SECRET"),
            bing_api_key: non_empty_env("BING_API_KEY"),
        };

        config.log_keys();
        config
    }

    /// Client ID and secret, when both are set.
    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        }
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  CHROME_WS_URL: {}", self.chrome_ws_url.as_deref().unwrap_or("<local launch>"));
        tracing::info!("  CHROME_HEADLESS: {}", self.chrome_headless);
        tracing::info!("  HARVEST_OUTPUT_DIR: {}", self.output_dir.display());
        tracing::info!("  SPOTIFY_CLIENT_ID: {}", preview(&self.spotify_client_id));
        tracing::info!("  SPOTIFY_CLIENT_SECRET: {}", preview(&self.spotify_client_secret));
        tracing::info!("  BING_API_KEY: {}", preview(&self.bing_api_key));
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

/// Target pages, selector fragments, and loop tuning. Every field has a
/// default, so a TOML file only needs the values it overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    pub hashtag_url: String,
    pub music_url: String,

    pub hashtag_fragment: String,
    pub title_fragment: String,
    pub author_fragment: String,
    pub graph_fragment: String,
    pub load_more_selector: String,

    pub capacity: usize,
    pub retry_budget: u32,
    pub wait_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub page_settle_secs: u64,
    pub reload_settle_secs: u64,
    pub advance_settle_secs: u64,

    pub thresholds: SignalThresholds,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            hashtag_url:
                "https://ads.tiktok.com/business/creativecenter/inspiration/popular/hashtag/pc/en"
                    .to_string(),
            music_url:
                "https://ads.tiktok.com/business/creativecenter/inspiration/popular/music/pc/en"
                    .to_string(),
            hashtag_fragment: "CardPc_titleText".to_string(),
            title_fragment: "ItemCard_musicName".to_string(),
            // Misspelled on the site itself.
            author_fragment: "ItemCard_autherName".to_string(),
            graph_fragment: "ItemCard_echartWrap".to_string(),
            load_more_selector:
                ".CcButton_common__aFDas.CcButton_secondary__N1HnA.index-mobile_common__E86XM"
                    .to_string(),
            capacity: 500,
            retry_budget: 3,
            wait_timeout_secs: 10,
            poll_interval_ms: 250,
            page_settle_secs: 10,
            reload_settle_secs: 5,
            advance_settle_secs: 2,
            thresholds: SignalThresholds::default(),
        }
    }
}

impl HarvestConfig {
    /// Load and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: HarvestConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            capacity: self.capacity,
            retry_budget: self.retry_budget,
            wait_timeout: Duration::from_secs(self.wait_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reload_settle: self.reload_settle(),
            advance_settle: Duration::from_secs(self.advance_settle_secs),
        }
    }

    /// Pause after navigating to a listing before reading its markup.
    pub fn page_settle(&self) -> Duration {
        Duration::from_secs(self.page_settle_secs)
    }

    pub fn reload_settle(&self) -> Duration {
        Duration::from_secs(self.reload_settle_secs)
    }
}

/// First five characters of a secret plus its length, for startup logs.
fn preview(val: &Option<String>) -> String {
    match val {
        Some(v) => {
            let head: String = v.chars().take(5).collect();
            format!("{}...({} chars)", head, v.chars().count())
        }
        None => "<not set>".to_string(),
    }
}
