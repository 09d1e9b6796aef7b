// =============================================================================
// Trade Helper — Main Entry Point
// =============================================================================
//
// Tracks a set of stock tickers and serves support/resistance trend lines and
// moving averages derived from their recent daily history.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod error;
mod indicators;
mod notifier;
mod quotes;
mod runtime_config;
mod tracker;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::notifier::{SlackConfig, SlackNotifier};
use crate::quotes::YahooQuoteClient;
use crate::runtime_config::RuntimeConfig;
use crate::tracker::Tracker;

const DEFAULT_CONFIG_PATH: &str = "trade_helper.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Trade Helper starting up");

    let config_path =
        std::env::var("TRADE_HELPER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env();

    // ── 2. Quote provider & tracker ──────────────────────────────────────
    let provider = Arc::new(YahooQuoteClient::new(
        config.quote_base_url.clone(),
        config.fetch_timeout(),
    )?);
    let tracker = Arc::new(Tracker::new(provider, config.refresh_settings()));

    // ── 3. Bulk load ─────────────────────────────────────────────────────
    if let Some(path) = &config.tickers_file {
        let summary = tracker.load_file(path, config.bulk_tolerance)?;
        info!(
            registered = ?summary.registered,
            failed = summary.failed.len(),
            "Initial tickers registered"
        );
    }
    if tracker.is_empty() {
        info!("No tickers tracked yet; register them with POST /stocks/:ticker");
    }

    // ── 4. Notifier ──────────────────────────────────────────────────────
    if let Some(path) = &config.slack_config {
        match SlackConfig::load(path) {
            Ok(slack) => {
                let notifier = SlackNotifier::new(slack);
                let text = format!("Trade Helper tracking: {}", tracker.list_tracked().join(", "));
                if let Err(e) = notifier
                    .send_message(notifier.default_channel(), &text)
                    .await
                {
                    warn!(error = %e, "Failed to send startup notice");
                }
            }
            Err(e) => warn!(error = %e, "Slack notifier disabled"),
        }
    }

    // ── 5. HTTP server ───────────────────────────────────────────────────
    let state = Arc::new(AppState::new(tracker.clone(), config.default_tolerance));
    let app = api::rest::router(state, &config.web_dir);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, web_dir = %config.web_dir.display(), "API server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "API server failed");
    }

    // ── 6. Shutdown ──────────────────────────────────────────────────────
    tracker.shutdown();
    info!("Trade Helper shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("Shutdown signal received, stopping gracefully"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
