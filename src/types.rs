// =============================================================================
// Shared types used across the trade helper
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One daily open/close record as delivered by the quote provider.
///
/// Sequences of bars are ordered most-recent first: index 0 is the latest
/// trading day. Index adjacency is the only ordering the engine relies on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub close: f64,
}

impl PriceBar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            close,
        }
    }
}

/// A local or global high/low taken from a bar's body envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtremePoint {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl ExtremePoint {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { value, timestamp }
    }

    /// Position of this point on the numeric time axis, in seconds since the
    /// UNIX epoch.
    pub fn epoch_seconds(&self) -> f64 {
        epoch_seconds(self.timestamp)
    }
}

/// Per-symbol tunables, set at registration and changed only through an
/// explicit update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Multiplier on the price spread that decides how close an extremum must
    /// sit to a trend line to count as a hit.
    pub tolerance: f64,
}

/// Seconds since the UNIX epoch, keeping sub-second precision.
pub fn epoch_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}
