// =============================================================================
// Extrema Detection — body envelopes, global and local highs/lows
// =============================================================================
//
// Each bar is reduced to its body envelope:
//   upper = max(open, close)
//   lower = min(open, close)
//
// A bar is a local maximum when both index-adjacent neighbours have a strictly
// lower `upper`, and a local minimum when both have a strictly higher `lower`.
// Neighbours are adjacent by index only; calendar gaps are not re-sampled.
// The first and last bars are never candidates.
// =============================================================================

use crate::types::{ExtremePoint, PriceBar};

/// Upper and lower bound of a bar's body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub upper: f64,
    pub lower: f64,
}

impl Envelope {
    pub fn of(bar: &PriceBar) -> Self {
        if bar.open > bar.close {
            Self {
                upper: bar.open,
                lower: bar.close,
            }
        } else {
            Self {
                upper: bar.close,
                lower: bar.open,
            }
        }
    }

    /// Midpoint of the body, the "day average".
    pub fn midpoint(&self) -> f64 {
        (self.upper + self.lower) / 2.0
    }
}

/// Global extremes plus the local candidates found in one bar sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Extrema {
    /// Lowest `lower` envelope across all bars.
    pub min: ExtremePoint,
    /// Highest `upper` envelope across all bars.
    pub max: ExtremePoint,
    /// Local maximum candidates, in bar order.
    pub maxima: Vec<ExtremePoint>,
    /// Local minimum candidates, in bar order.
    pub minima: Vec<ExtremePoint>,
}

/// Scan `bars` for global extremes and local extremum candidates.
///
/// Returns `None` for an empty slice. Ties keep the earliest index (the most
/// recent bar).
pub fn find_extrema(bars: &[PriceBar]) -> Option<Extrema> {
    let first = bars.first()?;
    let envelopes: Vec<Envelope> = bars.iter().map(Envelope::of).collect();

    let mut min = ExtremePoint::new(envelopes[0].lower, first.timestamp);
    let mut max = ExtremePoint::new(envelopes[0].upper, first.timestamp);
    for (bar, env) in bars.iter().zip(&envelopes).skip(1) {
        if env.lower < min.value {
            min = ExtremePoint::new(env.lower, bar.timestamp);
        }
        if env.upper > max.value {
            max = ExtremePoint::new(env.upper, bar.timestamp);
        }
    }

    let mut maxima = Vec::new();
    let mut minima = Vec::new();
    for (i, window) in envelopes.windows(3).enumerate() {
        let (prev, cur, next) = (window[0], window[1], window[2]);
        let ts = bars[i + 1].timestamp;
        if prev.upper < cur.upper && next.upper < cur.upper {
            maxima.push(ExtremePoint::new(cur.upper, ts));
        }
        if prev.lower > cur.lower && next.lower > cur.lower {
            minima.push(ExtremePoint::new(cur.lower, ts));
        }
    }

    Some(Extrema {
        min,
        max,
        maxima,
        minima,
    })
}

/// Square root of the *sum* of squared deviations of the day averages from
/// their mean. Deliberately not divided by the bar count: the hit tolerance
/// scales with this magnitude.
///
/// Returns `None` for an empty slice.
pub fn price_spread(bars: &[PriceBar]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }

    let day_avgs: Vec<f64> = bars.iter().map(|b| Envelope::of(b).midpoint()).collect();
    let mean = day_avgs.iter().sum::<f64>() / day_avgs.len() as f64;
    let sum_sq: f64 = day_avgs
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum();

    Some(sum_sq.sqrt())
}
