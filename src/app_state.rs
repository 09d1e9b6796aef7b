// =============================================================================
// Central Application State — Trade Helper
// =============================================================================
//
// Shared by every HTTP handler via `Arc<AppState>`. The tracker manages its
// own interior locking; AppState only adds the request-level defaults and a
// version counter for change detection.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::tracker::Tracker;

/// Central application state shared across all handlers.
pub struct AppState {
    /// Monotonically increasing version counter, bumped whenever the set of
    /// tracked symbols or a symbol's config changes.
    pub state_version: AtomicU64,

    pub tracker: Arc<Tracker>,

    /// Tolerance applied when a registration request does not carry one.
    pub default_tolerance: f64,

    /// Instant when the service was started. Used for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Lightweight status payload for `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub tracked: usize,
    /// Tracked symbols with a published analysis.
    pub analysed: usize,
    pub state_version: u64,
    pub uptime_secs: u64,
    pub server_time: i64,
}

impl AppState {
    pub fn new(tracker: Arc<Tracker>, default_tolerance: f64) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            tracker,
            default_tolerance,
            start_time: std::time::Instant::now(),
        }
    }

    /// Atomically increment the state version.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            status: "ok",
            tracked: self.tracker.len(),
            analysed: self.tracker.analysed_count(),
            state_version: self.current_state_version(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            server_time: chrono::Utc::now().timestamp_millis(),
        }
    }
}
