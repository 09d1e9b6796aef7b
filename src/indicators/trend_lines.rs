// =============================================================================
// Trend Lines — brute-force support/resistance fitting
// =============================================================================
//
// Every unordered pair of same-kind extrema defines one candidate line in
// (epoch seconds, price) space:
//   slope     = (v2 - v1) / (t2 - t1)
//   intercept = v2 - slope * t2
//
// Each line is then scored against every point of the same kind: a point is a
// hit when its value lies strictly inside `line(t) ± tolerance`. All candidate
// lines are kept; callers rank them by `hit_count`.
//
// k points yield k*(k-1)/2 lines, each scored against k points.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{epoch_seconds, ExtremePoint};

/// A linear fit through two extrema, scored by how many extrema it touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    /// Price change per second.
    pub slope: f64,
    /// Price at the UNIX epoch.
    pub intercept: f64,
    /// Number of same-kind extrema within tolerance of the line.
    pub hit_count: usize,
    /// The extrema counted in `hit_count`, in candidate order.
    pub hit_points: Vec<ExtremePoint>,
    /// The two extrema the line was drawn through.
    pub parents: [ExtremePoint; 2],
}

impl TrendLine {
    /// Line through `a` and `b`, with no hits recorded yet.
    ///
    /// Returns `None` when both points share a timestamp, since a vertical
    /// line has no slope/intercept form.
    pub fn through(a: ExtremePoint, b: ExtremePoint) -> Option<Self> {
        let dt = b.epoch_seconds() - a.epoch_seconds();
        if dt == 0.0 {
            return None;
        }
        let slope = (b.value - a.value) / dt;
        let intercept = b.value - slope * b.epoch_seconds();

        Some(Self {
            slope,
            intercept,
            hit_count: 0,
            hit_points: Vec::new(),
            parents: [a, b],
        })
    }

    /// Predicted price at `ts`.
    pub fn value_at(&self, ts: DateTime<Utc>) -> f64 {
        self.slope * epoch_seconds(ts) + self.intercept
    }

    /// Whether `point` lies strictly within `tolerance` of the line.
    pub fn is_hit(&self, point: &ExtremePoint, tolerance: f64) -> bool {
        let predicted = self.value_at(point.timestamp);
        point.value > predicted - tolerance && point.value < predicted + tolerance
    }

    fn score(&mut self, points: &[ExtremePoint], tolerance: f64) {
        self.hit_points = points
            .iter()
            .filter(|p| self.is_hit(p, tolerance))
            .copied()
            .collect();
        self.hit_count = self.hit_points.len();
    }
}

/// Fit and score one line for every unordered pair of `points`.
///
/// `tolerance` is an absolute price distance. Lines are emitted in pair order:
/// (0,1), (0,2), ... (1,2), ...
pub fn fit_trend_lines(points: &[ExtremePoint], tolerance: f64) -> Vec<TrendLine> {
    let mut lines = Vec::with_capacity(points.len() * points.len().saturating_sub(1) / 2);

    for (i, &a) in points.iter().enumerate() {
        for &b in &points[i + 1..] {
            if let Some(mut line) = TrendLine::through(a, b) {
                line.score(points, tolerance);
                lines.push(line);
            }
        }
    }

    lines
}
