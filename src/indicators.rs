//! Indicator derivation for daily bar series
//!
//! Every derived series is aligned to the bar timeline. Positions where a rolling
//! window has not filled yet hold `None`.
//!
//! # EMA warm-up
//!
//! Exponential averages use bias-corrected weighting from the first bar:
//! `ema[t] = sum((1-a)^k * x[t-k]) / sum((1-a)^k)` for `k in 0..=t`, with
//! `a = 2 / (span + 1)`. Early values are therefore defined, and the series
//! converges to the recursive EMA once a few spans have passed.

use serde::Serialize;
use tracing::{debug, error};

use crate::{conditions::PatternConditionEngine, Bar, EnrichedSeries, Period, Result, SignalError};

/// Windows of the simple and exponential moving averages
pub const SHORT_WINDOW: usize = 20;
pub const MEDIUM_WINDOW: usize = 50;
pub const LONG_WINDOW: usize = 200;

/// Derived per-bar values. `None` means "not yet available".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSeries {
    pub sma_20: Vec<Option<f64>>,
    pub sma_50: Vec<Option<f64>>,
    pub sma_200: Vec<Option<f64>>,
    pub ema_20: Vec<Option<f64>>,
    pub ema_50: Vec<Option<f64>>,
    pub ema_200: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub volume_sma: Vec<Option<f64>>,
    /// Current volume over its moving average; `None` when the average is 0
    pub volume_ratio: Vec<Option<f64>>,
    pub price_above_sma_20: Vec<Option<bool>>,
    pub price_above_sma_50: Vec<Option<bool>>,
    /// Rolling sample stdev of day-over-day fractional close changes
    pub volatility: Vec<Option<f64>>,
}

impl IndicatorSeries {
    /// A series of `len` positions with nothing available
    pub fn unavailable(len: usize) -> Self {
        Self {
            sma_20: vec![None; len],
            sma_50: vec![None; len],
            sma_200: vec![None; len],
            ema_20: vec![None; len],
            ema_50: vec![None; len],
            ema_200: vec![None; len],
            rsi: vec![None; len],
            volume_sma: vec![None; len],
            volume_ratio: vec![None; len],
            price_above_sma_20: vec![None; len],
            price_above_sma_50: vec![None; len],
            volatility: vec![None; len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sma_20.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sma_20.is_empty()
    }
}

/// Derives moving averages, RSI, volume ratio and volatility from bars
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    pub rsi_period: Period,
    pub volume_period: Period,
    pub volatility_period: Period,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self {
            rsi_period: Period::new_const(14),
            volume_period: Period::new_const(20),
            volatility_period: Period::new_const(20),
        }
    }
}

impl IndicatorEngine {
    /// Compute every indicator, failing if any bar lacks a required field.
    pub fn compute(&self, bars: &[Bar]) -> Result<IndicatorSeries> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                SignalError::InvalidBar { reason, .. } => SignalError::InvalidBar { index: i, reason },
                other => other,
            })?;
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

        let sma_20 = rolling_mean(&closes, SHORT_WINDOW);
        let sma_50 = rolling_mean(&closes, MEDIUM_WINDOW);
        let volume_sma = rolling_mean(&volumes, self.volume_period.get());

        let volume_ratio = volumes
            .iter()
            .zip(&volume_sma)
            .map(|(&v, avg)| match avg {
                Some(avg) if *avg > 0.0 => Some(v / avg),
                _ => None,
            })
            .collect();

        let series = IndicatorSeries {
            price_above_sma_20: above(&closes, &sma_20),
            price_above_sma_50: above(&closes, &sma_50),
            sma_200: rolling_mean(&closes, LONG_WINDOW),
            ema_20: ema(&closes, SHORT_WINDOW),
            ema_50: ema(&closes, MEDIUM_WINDOW),
            ema_200: ema(&closes, LONG_WINDOW),
            rsi: rsi(&closes, self.rsi_period.get()),
            volatility: rolling_std(&pct_change(&closes), self.volatility_period.get()),
            sma_20,
            sma_50,
            volume_sma,
            volume_ratio,
        };

        debug!(bars = bars.len(), "indicators computed");
        Ok(series)
    }

    /// Derive indicators and condition flags for one asset.
    ///
    /// Never fails: if indicator computation is rejected the bars are kept
    /// unmodified, every indicator position is `None`, and the error is logged.
    pub fn enrich(&self, bars: Vec<Bar>) -> EnrichedSeries {
        let indicators = match self.compute(&bars) {
            Ok(indicators) => indicators,
            Err(e) => {
                error!(error = %e, bars = bars.len(), "indicator computation failed, returning bars unmodified");
                IndicatorSeries::unavailable(bars.len())
            }
        };
        let conditions = PatternConditionEngine::default().detect(&bars, &indicators);

        // lengths agree by construction
        EnrichedSeries {
            bars,
            indicators,
            conditions,
        }
    }
}

// ============================================================
// WINDOW STATISTICS
// ============================================================

/// Simple rolling mean; the first `window - 1` positions are `None`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            Some(slice.iter().sum::<f64>() / window as f64)
        })
        .collect()
}

/// Rolling sample standard deviation over optional inputs.
///
/// A window containing any `None` yields `None`.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            let slice: Option<Vec<f64>> = values[i + 1 - window..=i].iter().copied().collect();
            slice.and_then(|s| sample_std(&s))
        })
        .collect()
}

/// Bias-corrected exponentially weighted mean with the given span
pub fn ema(values: &[f64], span: usize) -> Vec<Option<f64>> {
    let decay = 1.0 - 2.0 / (span as f64 + 1.0);
    let mut weighted = 0.0;
    let mut weight = 0.0;

    values
        .iter()
        .map(|&v| {
            weighted = v + decay * weighted;
            weight = 1.0 + decay * weight;
            Some(weighted / weight)
        })
        .collect()
}

/// Relative Strength Index over simple rolling averages of gains and losses.
///
/// The first delta is taken as 0, so the first value appears at `period - 1`.
/// A window without losses reads 100.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let deltas: Vec<f64> = (0..closes.len())
        .map(|i| if i == 0 { 0.0 } else { closes[i] - closes[i - 1] })
        .collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();

    rolling_mean(&gains, period)
        .into_iter()
        .zip(rolling_mean(&losses, period))
        .map(|(gain, loss)| match (gain, loss) {
            (Some(_), Some(loss)) if loss <= 0.0 => Some(100.0),
            (Some(gain), Some(loss)) => Some(100.0 - 100.0 / (1.0 + gain / loss)),
            _ => None,
        })
        .collect()
}

/// Day-over-day fractional change; `None` for the first bar or a zero base.
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i == 0 || values[i - 1] == 0.0 {
                None
            } else {
                Some((values[i] - values[i - 1]) / values[i - 1])
            }
        })
        .collect()
}

/// Sample (n - 1) standard deviation; `None` with fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

fn above(closes: &[f64], average: &[Option<f64>]) -> Vec<Option<bool>> {
    closes
        .iter()
        .zip(average)
        .map(|(c, avg)| avg.map(|a| *c > a))
        .collect()
}

// ============================================================
// TESTS
// ============================================================
