// =============================================================================
// Slack Notifier — outbound text alerts
// =============================================================================
//
// Posts plain-text messages through Slack's `chat.postMessage` Web API.
// SECURITY: the bot token is sent as a bearer header and never logged or
// serialized back out.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, instrument};

const SLACK_API_URL: &str = "https://slack.com/api/chat.postMessage";

/// Contents of the notifier config file: `{"channel": "...", "token": "..."}`.
#[derive(Clone, Deserialize)]
pub struct SlackConfig {
    /// Default channel for alerts.
    pub channel: String,
    pub token: String,
}

impl SlackConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read slack config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse slack config from {}", path.display()))?;

        info!(path = %path.display(), channel = %config.channel, "slack config loaded");
        Ok(config)
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("channel", &self.channel)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Sends messages to Slack channels.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    config: SlackConfig,
    api_url: String,
    client: reqwest::Client,
}

/// The subset of Slack's reply we act on.
#[derive(Debug, Deserialize)]
struct SlackReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> Self {
        Self::with_api_url(config, SLACK_API_URL)
    }

    pub fn with_api_url(config: SlackConfig, api_url: impl Into<String>) -> Self {
        Self {
            config,
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Channel configured as the default destination.
    pub fn default_channel(&self) -> &str {
        &self.config.channel
    }

    /// Post `text` to `channel`.
    #[instrument(skip(self, text), name = "slack::send_message")]
    pub async fn send_message(&self, channel: &str, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.config.token)
            .form(&[("channel", channel), ("text", text)])
            .send()
            .await
            .context("POST chat.postMessage request failed")?;

        let status = resp.status();
        let reply: SlackReply = resp
            .json()
            .await
            .context("failed to parse chat.postMessage response")?;

        check_reply(status, &reply)?;
        debug!(channel, "slack message sent");
        Ok(())
    }
}

fn check_reply(status: reqwest::StatusCode, reply: &SlackReply) -> Result<()> {
    if !status.is_success() {
        anyhow::bail!("Slack chat.postMessage returned {status}");
    }
    if !reply.ok {
        anyhow::bail!(
            "Slack rejected message: {}",
            reply.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
