//! Signal filtering, per-asset capping and ranking

use std::{
    cmp::Ordering,
    collections::BTreeMap,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Ratio, Result, Signal, SignalError};

/// Acceptance thresholds applied before ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterThresholds {
    pub min_confidence: f64,
    pub min_risk_reward: f64,
    /// Signals kept per symbol
    pub max_per_asset: usize,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_risk_reward: 1.5,
            max_per_asset: 2,
        }
    }
}

impl FilterThresholds {
    pub fn validate(&self) -> Result<()> {
        Ratio::new(self.min_confidence)?;
        if !self.min_risk_reward.is_finite() || self.min_risk_reward < 0.0 {
            return Err(SignalError::InvalidConfig(format!(
                "min_risk_reward must be finite and >= 0, got {}",
                self.min_risk_reward
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn passes(&self, signal: &Signal) -> bool {
        signal.confidence() >= self.min_confidence && signal.risk_reward() >= self.min_risk_reward
    }
}

/// Unavailable sorts before any value
fn optional_cmp(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.is_some().cmp(&b.is_some()),
    }
}

/// Best-first order within one symbol. Every field takes part so equal keys
/// only arise for identical signals.
fn best_first(a: &Signal, b: &Signal) -> Ordering {
    b.confidence()
        .total_cmp(&a.confidence())
        .then_with(|| b.risk_reward().total_cmp(&a.risk_reward()))
        .then_with(|| b.timestamp().cmp(&a.timestamp()))
        .then_with(|| a.setup().cmp(b.setup()))
        .then_with(|| a.side().as_str().cmp(b.side().as_str()))
        .then_with(|| a.entry().total_cmp(&b.entry()))
        .then_with(|| a.stop().total_cmp(&b.stop()))
        .then_with(|| a.target().total_cmp(&b.target()))
        .then_with(|| optional_cmp(a.volume_ratio(), b.volume_ratio()))
        .then_with(|| optional_cmp(a.volatility(), b.volatility()))
}

/// Filter, cap per symbol and order signals by descending confidence.
///
/// Keeps signals meeting both thresholds, then at most `max_per_asset` per
/// symbol (highest confidence first, then highest reward-to-risk). The result
/// does not depend on the order of `signals`.
pub fn rank_signals(signals: &[Signal], thresholds: &FilterThresholds) -> Vec<Signal> {
    let mut by_symbol: BTreeMap<&str, Vec<&Signal>> = BTreeMap::new();
    for signal in signals.iter().filter(|s| thresholds.passes(s)) {
        by_symbol.entry(signal.symbol()).or_default().push(signal);
    }

    let mut ranked: Vec<Signal> = by_symbol
        .into_values()
        .flat_map(|mut group| {
            group.sort_by(|a, b| best_first(a, b));
            group.truncate(thresholds.max_per_asset);
            group.into_iter().cloned()
        })
        .collect();

    ranked.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
    debug!(input = signals.len(), kept = ranked.len(), "signals ranked");
    ranked
}

/// Aggregate view over a signal list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalSummary {
    pub total: usize,
    pub buy: usize,
    pub sell: usize,
    pub avg_confidence: f64,
    pub avg_risk_reward: f64,
    /// Signal count per setup name
    pub setups: BTreeMap<&'static str, usize>,
}

impl SignalSummary {
    pub fn from_signals(signals: &[Signal]) -> Self {
        if signals.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            total: signals.len(),
            ..Self::default()
        };
        for signal in signals {
            if signal.side().is_buy() {
                summary.buy += 1;
            } else {
                summary.sell += 1;
            }
            *summary.setups.entry(signal.setup()).or_default() += 1;
        }

        let n = signals.len() as f64;
        summary.avg_confidence = signals.iter().map(|s| s.confidence()).sum::<f64>() / n;
        summary.avg_risk_reward = signals.iter().map(|s| s.risk_reward()).sum::<f64>() / n;
        summary
    }
}
