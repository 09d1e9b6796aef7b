// =============================================================================
// Yahoo Finance Chart Client — daily quote history over REST
// =============================================================================
//
// GET {base}/v8/finance/chart/{ticker}?period1=..&period2=..&interval=1d
//
// The chart payload carries parallel arrays:
//   chart.result[0].timestamp[i]
//   chart.result[0].indicators.quote[0].open[i] / close[i]
// Entries are oldest first and may contain nulls for halted sessions; nulls
// are skipped and the series is reversed so index 0 is the latest bar.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, instrument, warn};

use super::QuoteProvider;
use crate::types::PriceBar;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo Finance chart API client.
#[derive(Debug, Clone)]
pub struct YahooQuoteClient {
    base_url: String,
    client: reqwest::Client,
}

impl YahooQuoteClient {
    /// Build a client against `base_url` whose requests give up after
    /// `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        // The chart endpoint rejects requests without a browser-like agent.
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_static("Mozilla/5.0 (compatible; trade-helper/0.1)"),
        );

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "YahooQuoteClient initialised");

        Ok(Self { base_url, client })
    }

    fn chart_url(&self, ticker: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d",
            self.base_url,
            ticker,
            start.timestamp(),
            end.timestamp()
        )
    }

    /// Turn a chart response body into bars, most recent first.
    pub fn parse_chart(body: &serde_json::Value) -> Result<Vec<PriceBar>> {
        let chart = &body["chart"];
        if let Some(err) = chart.get("error").filter(|e| !e.is_null()) {
            anyhow::bail!("chart API error: {err}");
        }

        let result = chart["result"]
            .as_array()
            .and_then(|arr| arr.first())
            .context("chart response missing 'result'")?;

        // A range with no trading sessions has no timestamp array at all.
        let Some(timestamps) = result["timestamp"].as_array() else {
            return Ok(Vec::new());
        };

        let quote = &result["indicators"]["quote"][0];
        let opens = quote["open"]
            .as_array()
            .context("chart response missing 'open' series")?;
        let closes = quote["close"]
            .as_array()
            .context("chart response missing 'close' series")?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, ts) in timestamps.iter().enumerate() {
            let ts = ts.as_i64().context("non-integer timestamp in chart")?;
            let timestamp = DateTime::from_timestamp(ts, 0)
                .with_context(|| format!("timestamp {ts} out of range"))?;

            match (
                opens.get(i).and_then(|v| v.as_f64()),
                closes.get(i).and_then(|v| v.as_f64()),
            ) {
                (Some(open), Some(close)) => bars.push(PriceBar::new(timestamp, open, close)),
                _ => warn!(%timestamp, "skipping chart entry without open/close"),
            }
        }

        bars.reverse();
        Ok(bars)
    }
}

#[async_trait]
impl QuoteProvider for YahooQuoteClient {
    #[instrument(skip(self), name = "yahoo::fetch_daily_bars")]
    async fn fetch_daily_bars(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>> {
        let url = self.chart_url(ticker, start, end);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /v8/finance/chart request failed")?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .context("failed to read chart response body")?;

        // Error pages are not always JSON; report the status first.
        if !status.is_success() {
            anyhow::bail!("Yahoo GET /v8/finance/chart returned {}: {}", status, text);
        }

        let body: serde_json::Value =
            serde_json::from_str(&text).context("failed to parse chart response")?;
        let bars = Self::parse_chart(&body)?;
        debug!(ticker, count = bars.len(), "quote history fetched");
        Ok(bars)
    }
}
