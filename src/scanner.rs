//! Per-asset and multi-asset scanning
//!
//! A [`StrategySet`] runs every strategy over one asset and removes duplicates.
//! A [`Scanner`] dispatches one task per asset onto a bounded rayon pool and
//! merges finished results on the calling thread.

use std::{
    any::Any,
    collections::{HashMap, HashSet},
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    strategies::{BreakoutStrategy, BuiltinStrategy, GoldenCrossStrategy, Strategy},
    EnrichedSeries, Result, Signal, SignalError,
};

// ============================================================
// CONFIGURATION
// ============================================================

/// Scanner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Size of the worker pool
    pub max_workers: usize,
    /// Longest a single asset's scan may run
    pub task_timeout_ms: u64,
    /// Exchange suffixes removed from symbols before scanning
    pub strip_suffixes: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            task_timeout_ms: 60_000,
            strip_suffixes: vec![".NS".to_string()],
        }
    }
}

impl ScannerConfig {
    #[inline]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(SignalError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.task_timeout_ms == 0 {
            return Err(SignalError::InvalidConfig(
                "task_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Upper-case a raw symbol and drop the first matching exchange suffix
pub fn normalize_symbol(raw: &str, strip_suffixes: &[String]) -> String {
    let upper = raw.trim().to_uppercase();
    for suffix in strip_suffixes {
        if let Some(stripped) = upper.strip_suffix(suffix.to_uppercase().as_str()) {
            return stripped.to_string();
        }
    }
    upper
}

// ============================================================
// UNIVERSE
// ============================================================

/// Ordered list of symbols to scan, supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    symbols: Vec<String>,
}

impl Universe {
    /// Build from symbols, dropping repeats and keeping first-seen order
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let symbols = symbols
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| seen.insert(s.clone()))
            .collect();
        Self { symbols }
    }

    #[inline]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The first `limit` symbols
    pub fn liquid_subset(&self, limit: usize) -> Self {
        Self {
            symbols: self.symbols.iter().take(limit).cloned().collect(),
        }
    }
}

// ============================================================
// STRATEGY SET
// ============================================================

/// Result of scanning a single asset
#[derive(Debug, Clone, Default)]
pub struct AssetScan {
    pub symbol: String,
    /// Unique signals in discovery order
    pub signals: Vec<Signal>,
    /// Strategies that failed on this asset
    pub failures: Vec<SignalError>,
}

/// The fixed list of strategies applied to every asset
pub struct StrategySet {
    builtin: Vec<BuiltinStrategy>,
    custom: Vec<Box<dyn Strategy>>,
}

impl StrategySet {
    pub fn len(&self) -> usize {
        self.builtin.len() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builtins first, then custom strategies, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Strategy> + '_ {
        let builtin = self.builtin.iter().map(|s| s as &dyn Strategy);
        let custom = self.custom.iter().map(|s| s.as_ref() as &dyn Strategy);
        builtin.chain(custom)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|s| s.name()).collect()
    }

    /// Run every strategy over one asset.
    ///
    /// A strategy that errors or panics is recorded in `failures` and the rest
    /// still run. Signals sharing (symbol, setup, calendar day) keep only the
    /// first one found.
    pub fn scan(&self, series: &EnrichedSeries, symbol: &str) -> AssetScan {
        let mut found = Vec::new();
        let mut failures = Vec::new();

        for strategy in self.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| strategy.scan(series, symbol)));
            match outcome {
                Ok(Ok(signals)) => {
                    if !signals.is_empty() {
                        debug!(symbol, strategy = strategy.name(), count = signals.len(), "strategy found signals");
                    }
                    found.extend(signals);
                }
                Ok(Err(e)) => {
                    error!(symbol, strategy = strategy.name(), error = %e, "strategy failed");
                    failures.push(SignalError::StrategyFailed {
                        strategy: strategy.name(),
                        reason: e.to_string(),
                    });
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(symbol, strategy = strategy.name(), %reason, "strategy panicked");
                    failures.push(SignalError::StrategyFailed {
                        strategy: strategy.name(),
                        reason,
                    });
                }
            }
        }

        let signals = dedup_signals(found);
        debug!(symbol, count = signals.len(), "unique signals");

        AssetScan {
            symbol: symbol.to_string(),
            signals,
            failures,
        }
    }
}

/// Drop signals whose (symbol, setup, calendar day) was already seen
pub fn dedup_signals(signals: Vec<Signal>) -> Vec<Signal> {
    let mut seen = HashSet::new();
    signals
        .into_iter()
        .filter(|s| seen.insert((s.symbol().to_string(), s.setup(), s.trading_day())))
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ============================================================
// SCANNER
// ============================================================

/// An asset that contributed nothing because its task failed
#[derive(Debug, Clone)]
pub struct AssetFailure {
    pub symbol: String,
    pub error: SignalError,
}

/// Merged outcome of a multi-asset scan
#[derive(Debug, Clone, Default)]
pub struct BatchScan {
    /// Newest first; ties by confidence, then discovery order
    pub signals: Vec<Signal>,
    pub failures: Vec<AssetFailure>,
}

struct TaskReport {
    index: usize,
    symbol: String,
    elapsed: Duration,
    outcome: std::thread::Result<AssetScan>,
}

/// Multi-asset scanner over a bounded worker pool
pub struct Scanner {
    strategies: Arc<StrategySet>,
    pool: rayon::ThreadPool,
    config: ScannerConfig,
}

impl Scanner {
    #[inline]
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    #[inline]
    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    /// Scan one asset synchronously on the calling thread
    pub fn scan_asset(&self, series: &EnrichedSeries, raw_symbol: &str) -> AssetScan {
        let symbol = normalize_symbol(raw_symbol, &self.config.strip_suffixes);
        let scan = self.strategies.scan(series, &symbol);
        info!(symbol = %scan.symbol, signals = scan.signals.len(), "asset scanned");
        scan
    }

    /// Scan many assets in parallel.
    ///
    /// Each asset runs as one task on the pool. A task that panics or runs past
    /// the per-task timeout contributes no signals and is listed in
    /// `failures`. The collector stops waiting once every task could have
    /// used its full timeout, so a stuck asset never holds up the batch.
    /// Inputs whose normalized symbol was already seen are skipped.
    pub fn scan_many<I, S>(&self, assets: I) -> BatchScan
    where
        I: IntoIterator<Item = (S, Arc<EnrichedSeries>)>,
        S: Into<String>,
    {
        let timeout = self.config.task_timeout();
        let (tx, rx) = mpsc::channel::<TaskReport>();
        let mut symbols: Vec<String> = Vec::new();
        let mut dispatched = HashSet::new();

        for (raw, series) in assets {
            let raw: String = raw.into();
            let symbol = normalize_symbol(&raw, &self.config.strip_suffixes);
            if !dispatched.insert(symbol.clone()) {
                warn!(%raw, %symbol, "symbol already in this batch, skipping");
                continue;
            }
            let index = symbols.len();
            symbols.push(symbol.clone());

            let tx = tx.clone();
            let strategies = Arc::clone(&self.strategies);
            self.pool.spawn(move || {
                let started = Instant::now();
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| strategies.scan(&series, &symbol)));
                // the collector may have given up on this batch already
                let _ = tx.send(TaskReport {
                    index,
                    symbol,
                    elapsed: started.elapsed(),
                    outcome,
                });
            });
        }
        drop(tx);

        let total = symbols.len();
        let waves = u32::try_from(total.div_ceil(self.config.max_workers).max(1)).unwrap_or(u32::MAX);
        // None when the budget is past what Instant can hold: wait for every task
        let deadline = timeout
            .checked_mul(waves)
            .and_then(|budget| Instant::now().checked_add(budget));

        let mut slots: Vec<Option<AssetScan>> = vec![None; total];
        let mut failures = Vec::new();
        let mut settled = vec![false; total];
        let mut received = 0;

        while received < total {
            let next = match deadline {
                Some(deadline) => rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    .ok(),
                None => rx.recv().ok(),
            };
            let Some(report) = next else {
                break;
            };
            received += 1;
            settled[report.index] = true;

            match report.outcome {
                Ok(scan) if report.elapsed <= timeout => {
                    if scan.signals.is_empty() {
                        debug!(symbol = %report.symbol, "no signals");
                    } else {
                        info!(symbol = %report.symbol, signals = scan.signals.len(), "asset scanned");
                    }
                    slots[report.index] = Some(scan);
                }
                Ok(_) => {
                    error!(symbol = %report.symbol, elapsed = ?report.elapsed, "asset scan exceeded timeout");
                    failures.push(AssetFailure {
                        symbol: report.symbol.clone(),
                        error: SignalError::Timeout {
                            symbol: report.symbol,
                            elapsed: report.elapsed,
                        },
                    });
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(symbol = %report.symbol, %message, "asset scan panicked");
                    failures.push(AssetFailure {
                        symbol: report.symbol.clone(),
                        error: SignalError::Panicked {
                            symbol: report.symbol,
                            message,
                        },
                    });
                }
            }
        }

        for (index, symbol) in symbols.iter().enumerate() {
            if !settled[index] {
                error!(%symbol, "asset scan did not finish before the batch deadline");
                failures.push(AssetFailure {
                    symbol: symbol.clone(),
                    error: SignalError::Timeout {
                        symbol: symbol.clone(),
                        elapsed: timeout,
                    },
                });
            }
        }

        // input order is the discovery order, whatever order tasks finished in
        let mut signals = dedup_signals(
            slots
                .into_iter()
                .flatten()
                .flat_map(|scan| scan.signals)
                .collect(),
        );
        signals.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| b.confidence().total_cmp(&a.confidence()))
        });

        info!(assets = total, signals = signals.len(), failed = failures.len(), "batch scan complete");
        BatchScan { signals, failures }
    }

    /// Scan the universe's symbols that have data, in universe order
    pub fn scan_universe(
        &self,
        universe: &Universe,
        data: &HashMap<String, Arc<EnrichedSeries>>,
    ) -> BatchScan {
        let assets: Vec<(String, Arc<EnrichedSeries>)> = universe
            .symbols()
            .iter()
            .filter_map(|symbol| match data.get(symbol) {
                Some(series) => Some((symbol.clone(), Arc::clone(series))),
                None => {
                    warn!(%symbol, "no data for symbol, skipping");
                    None
                }
            })
            .collect();
        self.scan_many(assets)
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating Scanner instances
pub struct ScannerBuilder {
    builtin: Vec<BuiltinStrategy>,
    custom: Vec<Box<dyn Strategy>>,
    config: ScannerConfig,
}

impl Default for ScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self {
            builtin: Vec::new(),
            custom: Vec::new(),
            config: ScannerConfig::default(),
        }
    }

    /// Add every builtin strategy with default parameters
    pub fn with_all_defaults(mut self) -> Self {
        self.builtin.extend([
            BuiltinStrategy::GoldenCross(GoldenCrossStrategy::with_defaults()),
            BuiltinStrategy::Breakout(BreakoutStrategy::with_defaults()),
        ]);
        self
    }

    /// Add a builtin strategy
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, strategy: BuiltinStrategy) -> Self {
        self.builtin.push(strategy);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, strategy: BuiltinStrategy) -> Result<Self> {
        strategy.validate_config()?;
        self.builtin.push(strategy);
        Ok(self)
    }

    /// Add a strategy outside the builtin set
    pub fn add_custom<S: Strategy + 'static>(mut self, strategy: S) -> Self {
        self.custom.push(Box::new(strategy));
        self
    }

    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.max_workers = workers;
        self
    }

    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.config.task_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn strip_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.strip_suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }

    /// Validate every strategy and the config, then start the worker pool
    pub fn build(self) -> Result<Scanner> {
        self.config.validate()?;
        for strategy in &self.builtin {
            strategy.validate_config()?;
        }
        for strategy in &self.custom {
            strategy.validate_config()?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .thread_name(|i| format!("chartscan-worker-{i}"))
            .build()
            .map_err(|e| SignalError::ThreadPool(e.to_string()))?;

        let strategies = StrategySet {
            builtin: self.builtin,
            custom: self.custom,
        };
        info!(
            strategies = ?strategies.names(),
            workers = self.config.max_workers,
            "scanner initialized"
        );

        Ok(Scanner {
            strategies: Arc::new(strategies),
            pool,
            config: self.config,
        })
    }
}

// ============================================================
// TESTS
// ============================================================
