//! Validation contract and confidence scoring shared by all strategies

use tracing::debug;

use crate::{Bar, Side, Signal};

/// Minimum reward-to-risk a strategy accepts unless it overrides it
pub const DEFAULT_MIN_RISK_REWARD: f64 = 2.0;
/// Candidates below this confidence are rejected
pub const MIN_CONFIDENCE: f64 = 0.3;
/// Confidence used when there is not enough volume history
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;
/// Bars of volume history behind the confidence score
pub const VOLUME_LOOKBACK: usize = 20;

/// Why a candidate signal was refused
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    RiskReward { actual: f64, required: f64 },
    InvalidLevels(Side),
    LowConfidence(f64),
}

/// Apply the shared acceptance rules to a candidate.
pub fn validate_signal(signal: &Signal, min_risk_reward: f64) -> Result<(), Rejection> {
    if signal.risk_reward() < min_risk_reward {
        return Err(Rejection::RiskReward {
            actual: signal.risk_reward(),
            required: min_risk_reward,
        });
    }

    let (entry, stop, target) = (signal.entry(), signal.stop(), signal.target());
    let levels_ok = match signal.side() {
        Side::Buy => target > entry && stop < entry,
        Side::Sell => target < entry && stop > entry,
    };
    if !levels_ok {
        return Err(Rejection::InvalidLevels(signal.side()));
    }

    if signal.confidence() < MIN_CONFIDENCE {
        return Err(Rejection::LowConfidence(signal.confidence()));
    }

    Ok(())
}

/// Keep the candidate if it passes [`validate_signal`], logging the reason otherwise
pub fn accept(candidate: Signal, min_risk_reward: f64) -> Option<Signal> {
    match validate_signal(&candidate, min_risk_reward) {
        Ok(()) => Some(candidate),
        Err(reason) => {
            debug!(
                symbol = candidate.symbol(),
                setup = candidate.setup(),
                date = %candidate.trading_day(),
                ?reason,
                "signal rejected"
            );
            None
        }
    }
}

/// Confidence from the bar's volume against the mean of the prior 20 bars.
///
/// Returns the neutral 0.5 without 20 bars of history. A zero average counts
/// as ratio 1.0.
pub fn volume_confidence(bars: &[Bar], index: usize) -> f64 {
    if index < VOLUME_LOOKBACK || index >= bars.len() {
        return NEUTRAL_CONFIDENCE;
    }

    let prior = &bars[index - VOLUME_LOOKBACK..index];
    let avg = prior.iter().map(|b| b.volume).sum::<f64>() / VOLUME_LOOKBACK as f64;
    let ratio = if avg > 0.0 {
        bars[index].volume / avg
    } else {
        1.0
    };

    let confidence = match ratio {
        r if r >= 2.0 => 0.9,
        r if r >= 1.5 => 0.8,
        r if r >= 1.2 => 0.7,
        r if r >= 0.8 => 0.6,
        _ => 0.4,
    };
    f64::min(confidence, 1.0)
}

/// Highest high over `bars[start..end]`
#[inline]
pub fn highest_high(bars: &[Bar], start: usize, end: usize) -> Option<f64> {
    bars.get(start..end)?
        .iter()
        .map(|b| b.high)
        .reduce(f64::max)
}

/// Lowest low over `bars[start..end]`
#[inline]
pub fn lowest_low(bars: &[Bar], start: usize, end: usize) -> Option<f64> {
    bars.get(start..end)?
        .iter()
        .map(|b| b.low)
        .reduce(f64::min)
}
