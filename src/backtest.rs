//! Buy-and-hold benchmark metrics for one series

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{indicators::pct_change, indicators::sample_std, round_to, EnrichedSeries, Result, SignalError};

/// Name of the single entry in [`BacktestResult::strategy_metrics`]
pub const BUY_HOLD: &str = "Buy_Hold";

/// Descriptive statistics of holding the asset from the first bar to the last
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkMetrics {
    pub return_pct: f64,
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline, as a positive percentage
    pub max_drawdown_pct: f64,
    pub period_years: f64,
    pub annualized_return_pct: f64,
    pub volatility_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub asset_symbol: String,
    /// `None` when the series was too short to score
    pub benchmark: Option<BenchmarkMetrics>,
    pub strategy_metrics: BTreeMap<String, BenchmarkMetrics>,
    pub generated_at: DateTime<Utc>,
}

impl BacktestResult {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.benchmark.is_none()
    }
}

/// Buy-and-hold scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backtester {
    /// Trading bars in one year
    pub periods_per_year: usize,
}

impl Default for Backtester {
    fn default() -> Self {
        Self {
            periods_per_year: 252,
        }
    }
}

impl Backtester {
    /// Compute the buy-and-hold metrics, failing on fewer than 2 bars.
    pub fn benchmark(&self, series: &EnrichedSeries) -> Result<BenchmarkMetrics> {
        let bars = series.bars();
        if bars.len() < 2 {
            return Err(SignalError::InsufficientData {
                need: 2,
                got: bars.len(),
            });
        }
        if self.periods_per_year == 0 {
            return Err(SignalError::InvalidConfig(
                "periods_per_year must be positive".to_string(),
            ));
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let first = closes[0];
        let last = closes[closes.len() - 1];
        if first <= 0.0 {
            return Err(SignalError::Computation(format!(
                "first close must be positive, got {first}"
            )));
        }

        let total_return = (last - first) / first * 100.0;
        let years = closes.len() as f64 / self.periods_per_year as f64;
        let annualized = if years > 0.0 {
            (1.0 + total_return / 100.0).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let changes: Vec<f64> = pct_change(&closes).into_iter().flatten().collect();
        let volatility = sample_std(&changes).unwrap_or(0.0)
            * (self.periods_per_year as f64).sqrt()
            * 100.0;

        let sharpe = if volatility > 0.0 {
            annualized / (volatility / 100.0)
        } else {
            0.0
        };

        let metrics = BenchmarkMetrics {
            return_pct: round_to(total_return, 2),
            sharpe_ratio: round_to(sharpe, 2),
            max_drawdown_pct: round_to(max_drawdown(&closes), 2),
            period_years: round_to(years, 1),
            annualized_return_pct: round_to(annualized * 100.0, 2),
            volatility_pct: round_to(volatility, 2),
        };

        let values = [
            metrics.return_pct,
            metrics.sharpe_ratio,
            metrics.max_drawdown_pct,
            metrics.annualized_return_pct,
            metrics.volatility_pct,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SignalError::Computation(format!(
                "non-finite benchmark metrics: {metrics:?}"
            )));
        }
        Ok(metrics)
    }

    /// Score one asset. A series that cannot be scored gives an empty result.
    pub fn run(&self, series: &EnrichedSeries, symbol: &str) -> BacktestResult {
        let benchmark = match self.benchmark(series) {
            Ok(metrics) => {
                debug!(symbol, return_pct = metrics.return_pct, "benchmark computed");
                Some(metrics)
            }
            Err(e) => {
                warn!(symbol, error = %e, "benchmark unavailable");
                None
            }
        };

        let strategy_metrics = benchmark
            .map(|m| BTreeMap::from([(BUY_HOLD.to_string(), m)]))
            .unwrap_or_default();

        BacktestResult {
            asset_symbol: symbol.to_string(),
            benchmark,
            strategy_metrics,
            generated_at: Utc::now(),
        }
    }
}

/// Deepest fall from a running peak, as a positive percentage
pub fn max_drawdown(closes: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &close in closes {
        peak = peak.max(close);
        if peak > 0.0 {
            worst = worst.min((close - peak) / peak * 100.0);
        }
    }
    -worst
}
