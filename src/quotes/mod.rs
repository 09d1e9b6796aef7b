// =============================================================================
// Quote History Providers
// =============================================================================
//
// The store only needs one thing from the outside world: a ticker's daily bars
// over a date range, most recent first. Any failure means "no data this
// cycle"; the caller logs it and moves on.
// =============================================================================

pub mod yahoo;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::PriceBar;

pub use yahoo::YahooQuoteClient;

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Daily bars for `ticker` between `start` and `end`, index 0 being the
    /// most recent trading day.
    async fn fetch_daily_bars(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>>;
}
