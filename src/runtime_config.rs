// =============================================================================
// Runtime Configuration — JSON file with env overrides
// =============================================================================
//
// Every tunable of the service lives here. All fields carry
// `#[serde(default)]` so that adding new fields never breaks loading an older
// config file. Environment variables override the file after loading.
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::quotes::yahoo::DEFAULT_BASE_URL;
use crate::tracker::RefreshSettings;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_web_dir() -> PathBuf {
    PathBuf::from("web")
}

fn default_tolerance() -> f64 {
    0.05
}

fn default_bulk_tolerance() -> f64 {
    0.15
}

fn default_history_months() -> u32 {
    3
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_quote_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- HTTP ---------------------------------------------------------------

    /// Address the HTTP server listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory of static files served under `/static/`.
    #[serde(default = "default_web_dir")]
    pub web_dir: PathBuf,

    // --- Tracking -----------------------------------------------------------

    /// Newline-delimited ticker list registered at startup.
    #[serde(default)]
    pub tickers_file: Option<PathBuf>,

    /// Tolerance for registrations that do not specify one.
    #[serde(default = "default_tolerance")]
    pub default_tolerance: f64,

    /// Tolerance applied to every ticker from `tickers_file`.
    #[serde(default = "default_bulk_tolerance")]
    pub bulk_tolerance: f64,

    // --- Quote history ------------------------------------------------------

    /// Trailing window of daily bars fetched per analysis, in months.
    #[serde(default = "default_history_months")]
    pub history_months: u32,

    /// Upper bound on one quote-history request.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_quote_base_url")]
    pub quote_base_url: String,

    // --- Notifications ------------------------------------------------------

    /// Slack notifier config file; notifications are off when unset.
    #[serde(default)]
    pub slack_config: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            web_dir: default_web_dir(),
            tickers_file: None,
            default_tolerance: default_tolerance(),
            bulk_tolerance: default_bulk_tolerance(),
            history_months: default_history_months(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            quote_base_url: default_quote_base_url(),
            slack_config: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply `TRADE_HELPER_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(addr) = var("TRADE_HELPER_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(dir) = var("TRADE_HELPER_WEB_DIR") {
            self.web_dir = PathBuf::from(dir);
        }
        if let Some(file) = var("TRADE_HELPER_TICKERS") {
            self.tickers_file = Some(PathBuf::from(file));
        }
        if let Some(file) = var("TRADE_HELPER_SLACK_CONFIG") {
            self.slack_config = Some(PathBuf::from(file));
        }
    }

    /// [`RuntimeConfig::apply_overrides`] against the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            history_months: self.history_months,
            fetch_timeout: self.fetch_timeout(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
