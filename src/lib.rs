//! # chartscan - chart-pattern setup scanner
//!
//! Scans daily price/volume history for chart-pattern setups, emits risk-vetted
//! trade signals, ranks them, and scores a buy-and-hold benchmark.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use chartscan::prelude::*;
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
//! let bars: Vec<Bar> = (0..260)
//!     .map(|i| {
//!         let close = 100.0 + i as f64 * 0.5;
//!         Bar::new(start + Duration::days(i), close - 0.2, close + 1.0, close - 1.0, close, 1_000.0)
//!     })
//!     .collect();
//!
//! // Derive indicators and condition flags
//! let series = Arc::new(IndicatorEngine::default().enrich(bars));
//!
//! // Scan with the builtin strategy set
//! let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
//! let batch = scanner.scan_many(vec![("DEMO.NS", Arc::clone(&series))]);
//!
//! // Rank and benchmark
//! let ranked = rank_signals(&batch.signals, &FilterThresholds::default());
//! let result = Backtester::default().run(&series, "DEMO");
//! assert!(ranked.len() <= batch.signals.len());
//! assert!(result.benchmark.is_some());
//! ```

pub mod backtest;
pub mod conditions;
pub mod indicators;
pub mod params;
pub mod ranking;
pub mod scanner;
pub mod strategies;

pub mod prelude {
    pub use crate::{
        // Backtest
        backtest::{BacktestResult, Backtester, BenchmarkMetrics},
        // Conditions
        conditions::{Condition, ConditionSeries, PatternConditionEngine},
        // Indicators
        indicators::{IndicatorEngine, IndicatorSeries},
        // Parameters
        params::{ParamMeta, ParamType, ParameterizedStrategy},
        // Ranking
        ranking::{rank_signals, FilterThresholds, SignalSummary},
        // Scanner
        scanner::{
            AssetFailure, AssetScan, BatchScan, Scanner, ScannerBuilder, ScannerConfig,
            StrategySet, Universe,
        },
        // Strategies
        strategies::*,
        // Types
        Bar,
        EnrichedSeries,
        Period,
        PriceLevels,
        Ratio,
        Result,
        Side,
        Signal,
        // Errors
        SignalError,
        SignalRecord,
    };
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{conditions::ConditionSeries, indicators::IndicatorSeries};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors raised while deriving indicators, scanning or scoring
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Strategy {strategy} failed: {reason}")]
    StrategyFailed {
        strategy: &'static str,
        reason: String,
    },

    #[error("Scan of {symbol} timed out after {elapsed:?}")]
    Timeout {
        symbol: String,
        elapsed: std::time::Duration,
    },

    #[error("Scan of {symbol} panicked: {message}")]
    Panicked { symbol: String, message: String },

    #[error("Worker pool unavailable: {0}")]
    ThreadPool(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(SignalError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(SignalError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Window length in bars (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(SignalError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// BARS
// ============================================================

/// One trading period of price and volume data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Calendar day the bar belongs to
    #[inline]
    pub fn trading_day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Check that every required field carries a usable value.
    ///
    /// A NaN or infinite field is how a missing column shows up once bars are
    /// decoded, so it is reported rather than folded into the averages.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            (self.open, "open is missing or not finite"),
            (self.high, "high is missing or not finite"),
            (self.low, "low is missing or not finite"),
            (self.close, "close is missing or not finite"),
            (self.volume, "volume is missing or not finite"),
        ];
        for (value, reason) in fields {
            if !value.is_finite() {
                return Err(SignalError::InvalidBar { index: 0, reason });
            }
        }
        Ok(())
    }
}

// ============================================================
// ENRICHED SERIES
// ============================================================

/// Bars of one asset together with their derived indicators and condition flags.
///
/// All three sequences share the bar timeline: position `i` of every indicator
/// and flag describes `bars[i]`.
#[derive(Debug, Clone)]
pub struct EnrichedSeries {
    bars: Vec<Bar>,
    indicators: IndicatorSeries,
    conditions: ConditionSeries,
}

impl EnrichedSeries {
    pub fn new(bars: Vec<Bar>, indicators: IndicatorSeries, conditions: ConditionSeries) -> Result<Self> {
        if indicators.len() != bars.len() || conditions.len() != bars.len() {
            return Err(SignalError::InvalidConfig(format!(
                "series misaligned: {} bars, {} indicator rows, {} condition rows",
                bars.len(),
                indicators.len(),
                conditions.len()
            )));
        }
        Ok(Self {
            bars,
            indicators,
            conditions,
        })
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn indicators(&self) -> &IndicatorSeries {
        &self.indicators
    }

    #[inline]
    pub fn conditions(&self) -> &ConditionSeries {
        &self.conditions
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

// ============================================================
// SIGNALS
// ============================================================

/// Trade direction of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[inline]
    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Entry, stop and target prices of a candidate trade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
}

impl PriceLevels {
    /// Reward divided by risk for the given side; 0 when there is no risk.
    pub fn risk_reward(&self, side: Side) -> f64 {
        let (risk, reward) = match side {
            Side::Buy => ((self.entry - self.stop).abs(), (self.target - self.entry).abs()),
            Side::Sell => ((self.stop - self.entry).abs(), (self.entry - self.target).abs()),
        };
        if risk > 0.0 {
            reward / risk
        } else {
            0.0
        }
    }
}

/// A candidate trade emitted by a strategy scan. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    timestamp: DateTime<Utc>,
    symbol: String,
    setup: &'static str,
    side: Side,
    levels: PriceLevels,
    confidence: f64,
    volume_ratio: Option<f64>,
    volatility: Option<f64>,
    risk_reward: f64,
}

impl Signal {
    /// Build a signal; confidence saturates into [0, 1] and risk/reward is
    /// derived from the levels.
    pub fn new(
        timestamp: DateTime<Utc>,
        symbol: impl Into<String>,
        setup: &'static str,
        side: Side,
        levels: PriceLevels,
        confidence: f64,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            setup,
            side,
            levels,
            confidence: confidence.clamp(0.0, 1.0),
            volume_ratio: None,
            volatility: None,
            risk_reward: levels.risk_reward(side),
        }
    }

    pub fn with_volume_ratio(self, volume_ratio: Option<f64>) -> Self {
        Self {
            volume_ratio,
            ..self
        }
    }

    pub fn with_volatility(self, volatility: Option<f64>) -> Self {
        Self { volatility, ..self }
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[inline]
    pub fn trading_day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn setup(&self) -> &'static str {
        self.setup
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn levels(&self) -> PriceLevels {
        self.levels
    }

    #[inline]
    pub fn entry(&self) -> f64 {
        self.levels.entry
    }

    #[inline]
    pub fn stop(&self) -> f64 {
        self.levels.stop
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.levels.target
    }

    #[inline]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    #[inline]
    pub fn volume_ratio(&self) -> Option<f64> {
        self.volume_ratio
    }

    #[inline]
    pub fn volatility(&self) -> Option<f64> {
        self.volatility
    }

    #[inline]
    pub fn risk_reward(&self) -> f64 {
        self.risk_reward
    }

    /// Flatten into the export record handed to reporting collaborators
    pub fn to_record(&self) -> SignalRecord {
        SignalRecord {
            date: self.trading_day().format("%Y-%m-%d").to_string(),
            symbol: self.symbol.clone(),
            setup: self.setup.to_string(),
            side: self.side,
            entry: round_to(self.levels.entry, 2),
            stop: round_to(self.levels.stop, 2),
            target: round_to(self.levels.target, 2),
            confidence: round_to(self.confidence, 3),
            volume_ratio: self.volume_ratio.map(|v| round_to(v, 2)),
            atr: self.volatility.map(|v| round_to(v, 2)),
            risk_reward: round_to(self.risk_reward, 2),
        }
    }
}

/// Export shape of a signal: prices rounded to cents, confidence to 3 places
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub date: String,
    pub symbol: String,
    pub setup: String,
    pub side: Side,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    pub confidence: f64,
    pub volume_ratio: Option<f64>,
    pub atr: Option<f64>,
    pub risk_reward: f64,
}

#[inline]
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ============================================================
// TESTS
// ============================================================
