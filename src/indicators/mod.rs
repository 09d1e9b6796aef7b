// =============================================================================
// Technical Analysis Engine
// =============================================================================
//
// Pure, side-effect-free analysis of a daily bar sequence (most recent first).
// `analyze` either returns a complete `AnalysisResult` or fails with
// `InsufficientData`; it never yields a partial result.

pub mod extrema;
pub mod moving_average;
pub mod trend_lines;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::types::{ExtremePoint, PriceBar};

pub use extrema::{find_extrema, price_spread};
pub use moving_average::{cumulative_sma, decaying_ema};
pub use trend_lines::{fit_trend_lines, TrendLine};

/// Everything derived from one run of the engine for one symbol.
///
/// Built whole and swapped in whole; never updated field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Lowest lower envelope seen.
    pub min_point: ExtremePoint,
    /// Highest upper envelope seen.
    pub max_point: ExtremePoint,
    /// Close of the most recent bar.
    pub last_close: f64,
    /// Open of the most recent bar.
    pub last_open: f64,
    /// Lines fitted through local minima.
    pub support_lines: Vec<TrendLine>,
    /// Lines fitted through local maxima.
    pub resistance_lines: Vec<TrendLine>,
    pub sma: Vec<f64>,
    pub ema: Vec<f64>,
}

impl AnalysisResult {
    /// True for the placeholder a symbol holds before its first analysis.
    pub fn is_empty(&self) -> bool {
        self.sma.is_empty()
    }
}

/// Run the full analysis over `bars`.
///
/// `tolerance` is a multiplier on the price spread; the product is the
/// absolute distance within which an extremum counts as a trend-line hit.
pub fn analyze(bars: &[PriceBar], tolerance: f64) -> Result<AnalysisResult> {
    let latest = bars.first().ok_or(TrackerError::InsufficientData)?;
    let extrema = find_extrema(bars).ok_or(TrackerError::InsufficientData)?;
    let spread = price_spread(bars).ok_or(TrackerError::InsufficientData)?;
    let hit_tolerance = spread * tolerance;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    Ok(AnalysisResult {
        min_point: extrema.min,
        max_point: extrema.max,
        last_close: latest.close,
        last_open: latest.open,
        support_lines: fit_trend_lines(&extrema.minima, hit_tolerance),
        resistance_lines: fit_trend_lines(&extrema.maxima, hit_tolerance),
        sma: cumulative_sma(&closes),
        ema: decaying_ema(&closes),
    })
}
