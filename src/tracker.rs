// =============================================================================
// Tracked-Symbol Store
// =============================================================================
//
// Owns the ticker -> symbol mapping and launches one background recomputation
// task per registration.
//
// Thread safety:
//   - The mapping sits behind a single parking_lot::RwLock. Every lookup,
//     insert and removal goes through it.
//   - Each symbol guards its own config and result with independent locks, so
//     traffic on one symbol never blocks another.
//   - A recomputation task holds an Arc to its own symbol record and never
//     looks the ticker up again. If the symbol is deregistered mid-flight the
//     task writes into an orphaned record nobody can reach.
//   - Results are built in full before the write lock is taken and swapped in
//     wholesale, so readers see either the old or the new result, never a mix.
// =============================================================================

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Months, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TrackerError};
use crate::indicators::{analyze, AnalysisResult};
use crate::quotes::QuoteProvider;
use crate::types::SymbolConfig;

// =============================================================================
// TrackedSymbol
// =============================================================================

/// Per-symbol state: configuration plus the latest analysis snapshot.
pub struct TrackedSymbol {
    ticker: String,
    config: RwLock<SymbolConfig>,
    info: RwLock<AnalysisResult>,
    task: Mutex<Option<AbortHandle>>,
}

impl TrackedSymbol {
    fn new(ticker: String, config: SymbolConfig) -> Self {
        Self {
            ticker,
            config: RwLock::new(config),
            info: RwLock::new(AnalysisResult::default()),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> SymbolConfig {
        *self.config.read()
    }

    /// Copy of the current result. Empty until the first analysis lands.
    pub fn info(&self) -> AnalysisResult {
        self.info.read().clone()
    }

    fn publish(&self, result: AnalysisResult) {
        *self.info.write() = result;
    }
}

// =============================================================================
// RefreshSettings
// =============================================================================

/// How a recomputation task fetches its history.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    /// Trailing window of daily bars, in calendar months.
    pub history_months: u32,
    /// Upper bound on a single quote fetch.
    pub fetch_timeout: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            history_months: 3,
            fetch_timeout: Duration::from_secs(15),
        }
    }
}

// =============================================================================
// LoadSummary
// =============================================================================

/// Per-line outcome of a bulk load.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub registered: Vec<String>,
    pub failed: Vec<(String, TrackerError)>,
}

// =============================================================================
// Tracker
// =============================================================================

pub struct Tracker {
    symbols: RwLock<HashMap<String, Arc<TrackedSymbol>>>,
    provider: Arc<dyn QuoteProvider>,
    settings: RefreshSettings,
}

impl Tracker {
    pub fn new(provider: Arc<dyn QuoteProvider>, settings: RefreshSettings) -> Self {
        Self {
            symbols: RwLock::new(HashMap::new()),
            provider,
            settings,
        }
    }

    /// Start tracking `ticker` and kick off its first analysis in the
    /// background.
    ///
    /// Must be called from within a tokio runtime. Returns as soon as the
    /// symbol is inserted; the analysis result shows up later.
    pub fn register(&self, ticker: &str, tolerance: f64) -> Result<()> {
        let ticker = normalize_ticker(ticker)?;
        validate_tolerance(tolerance)?;

        let symbol = {
            let mut symbols = self.symbols.write();
            match symbols.entry(ticker.clone()) {
                Entry::Occupied(_) => return Err(TrackerError::AlreadyTracked(ticker)),
                Entry::Vacant(slot) => {
                    let symbol = Arc::new(TrackedSymbol::new(ticker.clone(), SymbolConfig { tolerance }));
                    slot.insert(symbol.clone());
                    symbol
                }
            }
        };

        let handle = tokio::spawn(recompute(
            symbol.clone(),
            self.provider.clone(),
            self.settings,
        ));
        *symbol.task.lock() = Some(handle.abort_handle());

        info!(ticker = %ticker, tolerance, "tracking stock");
        Ok(())
    }

    /// Stop tracking `ticker`. An in-flight recomputation is left to finish
    /// against the detached record.
    pub fn deregister(&self, ticker: &str) -> Result<()> {
        let ticker = normalize_ticker(ticker)?;
        let removed = self.symbols.write().remove(&ticker);
        match removed {
            Some(_) => {
                info!(ticker = %ticker, "stopped tracking stock");
                Ok(())
            }
            None => Err(TrackerError::NotTracked(ticker)),
        }
    }

    pub fn config(&self, ticker: &str) -> Result<SymbolConfig> {
        Ok(self.symbol(ticker)?.config())
    }

    /// Replace the tolerance of a tracked symbol. Takes effect on the next
    /// analysis run; the current result is left as is.
    pub fn update_config(&self, ticker: &str, tolerance: f64) -> Result<SymbolConfig> {
        validate_tolerance(tolerance)?;
        let symbol = self.symbol(ticker)?;
        let config = SymbolConfig { tolerance };
        *symbol.config.write() = config;
        info!(ticker = %symbol.ticker, tolerance, "stock config updated");
        Ok(config)
    }

    pub fn info(&self, ticker: &str) -> Result<AnalysisResult> {
        Ok(self.symbol(ticker)?.info())
    }

    /// All tracked tickers, sorted.
    pub fn list_tracked(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.symbols.read().keys().cloned().collect();
        tickers.sort();
        tickers
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }

    /// Number of tracked symbols whose first analysis has landed.
    pub fn analysed_count(&self) -> usize {
        self.symbols
            .read()
            .values()
            .filter(|symbol| !symbol.info.read().is_empty())
            .count()
    }

    /// Register one ticker per line of `reader` with `tolerance`.
    ///
    /// Blank lines are skipped. A failed registration is recorded and the
    /// remaining lines still run; only a read error stops the load.
    pub fn load_from_reader<R: BufRead>(&self, reader: R, tolerance: f64) -> std::io::Result<LoadSummary> {
        let mut summary = LoadSummary::default();

        for line in reader.lines() {
            let line = line?;
            let ticker = line.trim();
            if ticker.is_empty() {
                continue;
            }
            match self.register(ticker, tolerance) {
                Ok(()) => summary.registered.push(ticker.to_uppercase()),
                Err(e) => {
                    warn!(ticker, error = %e, "skipping ticker from list");
                    summary.failed.push((ticker.to_string(), e));
                }
            }
        }

        info!(
            registered = summary.registered.len(),
            failed = summary.failed.len(),
            "ticker list loaded"
        );
        Ok(summary)
    }

    /// [`Tracker::load_from_reader`] over a newline-delimited file.
    pub fn load_file(&self, path: impl AsRef<Path>, tolerance: f64) -> anyhow::Result<LoadSummary> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open ticker list {}", path.display()))?;
        self.load_from_reader(std::io::BufReader::new(file), tolerance)
            .with_context(|| format!("failed to read ticker list {}", path.display()))
    }

    /// Abort recomputation tasks still running for tracked symbols.
    pub fn shutdown(&self) {
        let symbols = self.symbols.read();
        for symbol in symbols.values() {
            if let Some(handle) = symbol.task.lock().take() {
                if !handle.is_finished() {
                    debug!(ticker = %symbol.ticker, "aborting recomputation");
                    handle.abort();
                }
            }
        }
    }

    fn symbol(&self, ticker: &str) -> Result<Arc<TrackedSymbol>> {
        let ticker = normalize_ticker(ticker)?;
        self.symbols
            .read()
            .get(&ticker)
            .cloned()
            .ok_or(TrackerError::NotTracked(ticker))
    }
}

// =============================================================================
// Background recomputation
// =============================================================================

/// Fetch the trailing history for `symbol`, analyse it and publish the result.
/// Any failure is logged and leaves the previous result in place.
async fn recompute(symbol: Arc<TrackedSymbol>, provider: Arc<dyn QuoteProvider>, settings: RefreshSettings) {
    let end = Utc::now();
    let start = end
        .checked_sub_months(Months::new(settings.history_months))
        .unwrap_or(end);

    let fetch = provider.fetch_daily_bars(&symbol.ticker, start, end);
    let bars = match tokio::time::timeout(settings.fetch_timeout, fetch).await {
        Ok(Ok(bars)) => bars,
        Ok(Err(e)) => {
            let err = TrackerError::QuoteFetch {
                ticker: symbol.ticker.clone(),
                reason: format!("{e:#}"),
            };
            error!(ticker = %symbol.ticker, error = %err, "error getting quote history");
            return;
        }
        Err(_) => {
            let err = TrackerError::QuoteFetch {
                ticker: symbol.ticker.clone(),
                reason: format!("timed out after {:?}", settings.fetch_timeout),
            };
            error!(ticker = %symbol.ticker, error = %err, "error getting quote history");
            return;
        }
    };

    let tolerance = symbol.config().tolerance;
    match analyze(&bars, tolerance) {
        Ok(result) => {
            info!(
                ticker = %symbol.ticker,
                bars = bars.len(),
                supports = result.support_lines.len(),
                resistances = result.resistance_lines.len(),
                "analysis updated"
            );
            symbol.publish(result);
        }
        Err(e) => warn!(ticker = %symbol.ticker, error = %e, "analysis skipped"),
    }
}

// =============================================================================
// Input validation
// =============================================================================

fn normalize_ticker(ticker: &str) -> Result<String> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(TrackerError::InvalidTicker(ticker.to_string()));
    }
    Ok(ticker.to_uppercase())
}

fn validate_tolerance(tolerance: f64) -> Result<()> {
    if tolerance.is_finite() && tolerance >= 0.0 {
        Ok(())
    } else {
        Err(TrackerError::InvalidTolerance(tolerance))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone};
    use tokio::sync::Notify;

    use crate::types::PriceBar;

    /// In-memory provider that can hold every fetch until released.
    struct ScriptedProvider {
        bars: Vec<PriceBar>,
        fail: bool,
        gate: Option<Arc<Notify>>,
        calls: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ScriptedProvider {
        fn with_bars(bars: Vec<PriceBar>) -> Self {
            Self {
                bars,
                fail: false,
                gate: None,
                calls: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::with_bars(Vec::new())
            }
        }

        fn gated(bars: Vec<PriceBar>, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::with_bars(bars)
            }
        }
    }

    #[async_trait]
    impl QuoteProvider for ScriptedProvider {
        async fn fetch_daily_bars(
            &self,
            _ticker: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> anyhow::Result<Vec<PriceBar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("provider unavailable");
            }
            Ok(self.bars.clone())
        }
    }

    fn sample_bars() -> Vec<PriceBar> {
        let latest = Utc.with_ymd_and_hms(2024, 6, 28, 0, 0, 0).unwrap();
        [9.0, 13.0, 11.0, 12.0, 10.0, 12.5, 9.5]
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(latest - ChronoDuration::days(i as i64), c - 0.5, c))
            .collect()
    }

    fn tracker_with(provider: Arc<ScriptedProvider>) -> Tracker {
        Tracker::new(provider, RefreshSettings::default())
    }

    /// Poll `check` until it holds or two seconds pass.
    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn register_then_duplicate_fails() {
        let tracker = tracker_with(Arc::new(ScriptedProvider::with_bars(sample_bars())));
        tracker.register("AAPL", 0.05).unwrap();
        let err = tracker.register("AAPL", 0.05).unwrap_err();
        assert!(matches!(err, TrackerError::AlreadyTracked(t) if t == "AAPL"));
    }

    #[tokio::test]
    async fn deregister_then_register_succeeds() {
        let tracker = tracker_with(Arc::new(ScriptedProvider::with_bars(sample_bars())));
        tracker.register("AAPL", 0.05).unwrap();
        tracker.deregister("AAPL").unwrap();
        assert!(tracker.is_empty());
        tracker.register("AAPL", 0.1).unwrap();
        assert_eq!(tracker.config("AAPL").unwrap().tolerance, 0.1);
    }

    #[tokio::test]
    async fn unknown_ticker_is_not_tracked() {
        let tracker = tracker_with(Arc::new(ScriptedProvider::with_bars(sample_bars())));
        assert!(matches!(tracker.deregister("NOPE"), Err(TrackerError::NotTracked(_))));
        assert!(matches!(tracker.config("NOPE"), Err(TrackerError::NotTracked(_))));
        assert!(matches!(tracker.info("NOPE"), Err(TrackerError::NotTracked(_))));
        assert!(matches!(
            tracker.update_config("NOPE", 0.2),
            Err(TrackerError::NotTracked(_))
        ));
    }

    #[tokio::test]
    async fn tickers_are_normalised() {
        let tracker = tracker_with(Arc::new(ScriptedProvider::with_bars(sample_bars())));
        tracker.register("  msft ", 0.05).unwrap();
        assert_eq!(tracker.list_tracked(), vec!["MSFT".to_string()]);
        assert!(tracker.config("Msft").is_ok());
        assert!(matches!(tracker.register("MSFT", 0.05), Err(TrackerError::AlreadyTracked(_))));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let tracker = tracker_with(Arc::new(ScriptedProvider::with_bars(sample_bars())));
        assert!(matches!(tracker.register("   ", 0.05), Err(TrackerError::InvalidTicker(_))));
        assert!(matches!(tracker.register("AAPL", -0.1), Err(TrackerError::InvalidTolerance(_))));
        assert!(matches!(
            tracker.register("AAPL", f64::NAN),
            Err(TrackerError::InvalidTolerance(_))
        ));
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn background_task_publishes_analysis() {
        let provider = Arc::new(ScriptedProvider::with_bars(sample_bars()));
        let tracker = tracker_with(provider.clone());
        tracker.register("AAPL", 0.05).unwrap();

        wait_until(|| !tracker.info("AAPL").unwrap().is_empty()).await;

        let info = tracker.info("AAPL").unwrap();
        assert_eq!(info, analyze(&sample_bars(), 0.05).unwrap());
        assert_eq!(info.last_close, 9.0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.analysed_count(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_result_empty() {
        let provider = Arc::new(ScriptedProvider::failing());
        let tracker = tracker_with(provider.clone());
        tracker.register("AAPL", 0.05).unwrap();

        wait_until(|| provider.finished.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(tracker.info("AAPL").unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.analysed_count(), 0);
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test]
    async fn empty_history_leaves_result_empty() {
        let provider = Arc::new(ScriptedProvider::with_bars(Vec::new()));
        let tracker = tracker_with(provider.clone());
        tracker.register("AAPL", 0.05).unwrap();

        wait_until(|| provider.finished.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(tracker.info("AAPL").unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::gated(sample_bars(), gate));
        let tracker = Tracker::new(
            provider.clone(),
            RefreshSettings {
                history_months: 3,
                fetch_timeout: Duration::from_millis(20),
            },
        );
        tracker.register("AAPL", 0.05).unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.finished.load(Ordering::SeqCst), 0);
        assert!(tracker.info("AAPL").unwrap().is_empty());
    }

    #[tokio::test]
    async fn readers_see_empty_or_final_result() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::gated(sample_bars(), gate.clone()));
        let tracker = Arc::new(tracker_with(provider.clone()));
        tracker.register("AAPL", 0.05).unwrap();

        let expected = analyze(&sample_bars(), 0.05).unwrap();

        let mut readers = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            let expected = expected.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let info = tracker.info("AAPL").unwrap();
                    assert!(info.is_empty() || info == expected);
                    tokio::task::yield_now().await;
                }
            }));
        }

        wait_until(|| provider.calls.load(Ordering::SeqCst) == 1).await;
        gate.notify_one();

        for reader in readers {
            reader.await.unwrap();
        }
        wait_until(|| !tracker.info("AAPL").unwrap().is_empty()).await;
        assert_eq!(tracker.info("AAPL").unwrap(), expected);
    }

    #[tokio::test]
    async fn deregister_during_fetch_is_harmless() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::gated(sample_bars(), gate.clone()));
        let tracker = tracker_with(provider.clone());
        tracker.register("AAPL", 0.05).unwrap();
        wait_until(|| provider.calls.load(Ordering::SeqCst) == 1).await;

        tracker.deregister("AAPL").unwrap();
        // Re-register while the first task is still parked on the gate; the
        // stale task must not write into the new record.
        tracker.register("AAPL", 0.2).unwrap();
        wait_until(|| provider.calls.load(Ordering::SeqCst) == 2).await;

        gate.notify_one();
        wait_until(|| provider.finished.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Only one of the two fetches has completed. If it was the stale one,
        // the live record is untouched; if it was the live one, the result
        // reflects the live tolerance.
        let info = tracker.info("AAPL").unwrap();
        assert!(info.is_empty() || info == analyze(&sample_bars(), 0.2).unwrap());

        gate.notify_one();
        wait_until(|| provider.finished.load(Ordering::SeqCst) == 2).await;
        wait_until(|| !tracker.info("AAPL").unwrap().is_empty()).await;
        assert_eq!(tracker.info("AAPL").unwrap(), analyze(&sample_bars(), 0.2).unwrap());
        assert_eq!(tracker.config("AAPL").unwrap().tolerance, 0.2);
    }

    #[tokio::test]
    async fn update_config_changes_tolerance_only() {
        let tracker = tracker_with(Arc::new(ScriptedProvider::with_bars(sample_bars())));
        tracker.register("AAPL", 0.05).unwrap();
        let cfg = tracker.update_config("aapl", 0.3).unwrap();
        assert_eq!(cfg.tolerance, 0.3);
        assert_eq!(tracker.config("AAPL").unwrap().tolerance, 0.3);
        assert!(matches!(
            tracker.update_config("AAPL", f64::INFINITY),
            Err(TrackerError::InvalidTolerance(_))
        ));
    }

    #[tokio::test]
    async fn bulk_load_survives_individual_failures() {
        let tracker = tracker_with(Arc::new(ScriptedProvider::with_bars(sample_bars())));
        tracker.register("MSFT", 0.05).unwrap();

        let list = "AAPL\nMSFT\n\nGOOG\n";
        let summary = tracker.load_from_reader(list.as_bytes(), 0.15).unwrap();

        assert_eq!(summary.registered, vec!["AAPL".to_string(), "GOOG".to_string()]);
        assert_eq!(summary.failed.len(), 1);
        assert!(matches!(summary.failed[0].1, TrackerError::AlreadyTracked(_)));
        assert_eq!(tracker.list_tracked(), vec!["AAPL", "GOOG", "MSFT"]);
        assert_eq!(tracker.config("GOOG").unwrap().tolerance, 0.15);
        // The pre-existing registration keeps its own tolerance.
        assert_eq!(tracker.config("MSFT").unwrap().tolerance, 0.05);
    }

    #[tokio::test]
    async fn load_file_reports_missing_file() {
        let tracker = tracker_with(Arc::new(ScriptedProvider::with_bars(sample_bars())));
        let err = tracker
            .load_file("/nonexistent/tickers.txt", 0.15)
            .unwrap_err();
        assert!(err.to_string().contains("failed to open ticker list"));
    }

    #[tokio::test]
    async fn shutdown_aborts_pending_fetches() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::gated(sample_bars(), gate.clone()));
        let tracker = tracker_with(provider.clone());
        tracker.register("AAPL", 0.05).unwrap();
        wait_until(|| provider.calls.load(Ordering::SeqCst) == 1).await;

        tracker.shutdown();
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(provider.finished.load(Ordering::SeqCst), 0);
        assert!(tracker.info("AAPL").unwrap().is_empty());
    }
}
