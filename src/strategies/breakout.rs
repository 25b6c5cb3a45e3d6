//! Simple breakout: close clearing the recent high

use std::collections::HashMap;

use super::helpers::{accept, highest_high, lowest_low, volume_confidence, DEFAULT_MIN_RISK_REWARD};
use super::Strategy;
use crate::{
    params::{check_known, get_period, get_ratio, get_value, ParamMeta, ParameterizedStrategy},
    EnrichedSeries, Period, PriceLevels, Ratio, Result, Side, Signal, SignalError,
};

/// Setup name of breakout signals
pub const SIMPLE_BREAKOUT: &str = "Simple_Breakout";

/// Buys a close above the highest high of the prior `lookback` bars by `breakout_margin`.
///
/// Stop sits `stop_buffer` under the lowest low of the prior `stop_lookback` bars;
/// target is `reward_multiple` times the risk above entry. Needs twice the
/// lookback in history.
#[derive(Debug, Clone)]
pub struct BreakoutStrategy {
    pub lookback: Period,
    pub stop_lookback: Period,
    pub breakout_margin: Ratio,
    pub stop_buffer: Ratio,
    pub reward_multiple: f64,
    pub min_risk_reward: f64,
}

impl Default for BreakoutStrategy {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(20),
            stop_lookback: Period::new_const(10),
            breakout_margin: Ratio::new_const(0.01),
            stop_buffer: Ratio::new_const(0.02),
            reward_multiple: 2.0,
            min_risk_reward: DEFAULT_MIN_RISK_REWARD,
        }
    }
}

impl Strategy for BreakoutStrategy {
    fn name(&self) -> &'static str {
        SIMPLE_BREAKOUT
    }

    fn min_bars(&self) -> usize {
        self.lookback.get() * 2
    }

    fn min_risk_reward(&self) -> f64 {
        self.min_risk_reward
    }

    fn scan(&self, series: &EnrichedSeries, symbol: &str) -> Result<Vec<Signal>> {
        let bars = series.bars();
        if bars.len() < self.min_bars() {
            return Ok(Vec::new());
        }

        let indicators = series.indicators();
        let lookback = self.lookback.get();
        let mut signals = Vec::new();

        for i in lookback..bars.len() {
            let Some(recent_high) = highest_high(bars, i - lookback, i) else {
                continue;
            };
            let entry = bars[i].close;
            if entry <= recent_high * (1.0 + self.breakout_margin.get()) {
                continue;
            }

            let Some(floor) = lowest_low(bars, i.saturating_sub(self.stop_lookback.get()), i) else {
                continue;
            };
            let stop = floor * (1.0 - self.stop_buffer.get());
            let levels = PriceLevels {
                entry,
                stop,
                target: entry + (entry - stop) * self.reward_multiple,
            };

            let candidate = Signal::new(
                bars[i].timestamp,
                symbol,
                SIMPLE_BREAKOUT,
                Side::Buy,
                levels,
                volume_confidence(bars, i),
            )
            .with_volume_ratio(indicators.volume_ratio[i])
            .with_volatility(indicators.volatility[i]);

            signals.extend(accept(candidate, self.min_risk_reward));
        }

        Ok(signals)
    }

    fn validate_config(&self) -> Result<()> {
        if !self.reward_multiple.is_finite() || self.reward_multiple <= 0.0 {
            return Err(SignalError::InvalidConfig(format!(
                "{SIMPLE_BREAKOUT}: reward_multiple must be positive, got {}",
                self.reward_multiple
            )));
        }
        if !self.min_risk_reward.is_finite() || self.min_risk_reward < 0.0 {
            return Err(SignalError::InvalidConfig(format!(
                "{SIMPLE_BREAKOUT}: min_risk_reward must be finite and >= 0, got {}",
                self.min_risk_reward
            )));
        }
        Ok(())
    }
}

const BREAKOUT_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 20.0, (5.0, 100.0), "Bars behind the recent high"),
    ParamMeta::period("stop_lookback", 10.0, (2.0, 50.0), "Bars behind the stop floor"),
    ParamMeta::ratio(
        "breakout_margin",
        0.01,
        (0.0, 0.1),
        "Required clearance over the recent high",
    ),
    ParamMeta::ratio(
        "stop_buffer",
        0.02,
        (0.0, 0.1),
        "Stop distance under the floor",
    ),
    ParamMeta::factor(
        "reward_multiple",
        2.0,
        (0.5, 5.0),
        "Target distance in multiples of risk",
    ),
    ParamMeta::factor(
        "min_risk_reward",
        DEFAULT_MIN_RISK_REWARD,
        (0.1, 5.0),
        "Minimum reward-to-risk accepted",
    ),
];

impl ParameterizedStrategy for BreakoutStrategy {
    fn param_meta() -> &'static [ParamMeta] {
        BREAKOUT_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_known(params, BREAKOUT_PARAMS)?;
        let strategy = Self {
            lookback: get_period(params, BREAKOUT_PARAMS, "lookback")?,
            stop_lookback: get_period(params, BREAKOUT_PARAMS, "stop_lookback")?,
            breakout_margin: get_ratio(params, BREAKOUT_PARAMS, "breakout_margin")?,
            stop_buffer: get_ratio(params, BREAKOUT_PARAMS, "stop_buffer")?,
            reward_multiple: get_value(params, BREAKOUT_PARAMS, "reward_multiple")?,
            min_risk_reward: get_value(params, BREAKOUT_PARAMS, "min_risk_reward")?,
        };
        strategy.validate_config()?;
        Ok(strategy)
    }

    fn setup_name() -> &'static str {
        SIMPLE_BREAKOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{indicators::IndicatorEngine, Bar};
    use chrono::{Duration, TimeZone, Utc};

    /// `flat` quiet bars (high 101, low 100, volume 1000) then one breakout bar
    fn breakout_series(flat: usize, close: f64, volume: f64) -> EnrichedSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut bars: Vec<Bar> = (0..flat)
            .map(|i| Bar::new(start + Duration::days(i as i64), 100.5, 101.0, 100.0, 100.5, 1_000.0))
            .collect();
        bars.push(Bar::new(
            start + Duration::days(flat as i64),
            close - 0.5,
            close + 1.0,
            close - 1.0,
            close,
            volume,
        ));
        IndicatorEngine::default().enrich(bars)
    }

    #[test]
    fn test_high_volume_breakout() {
        let series = breakout_series(40, 112.0, 3_000.0);
        let signals = BreakoutStrategy::default().scan(&series, "TCS").unwrap();

        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.side(), Side::Buy);
        assert_eq!(signal.entry(), 112.0);
        // lowest low 100 less 2%
        assert!((signal.stop() - 98.0).abs() < 1e-9);
        assert!((signal.target() - 140.0).abs() < 1e-9);
        assert_eq!(signal.confidence(), 0.9);
        assert!((signal.risk_reward() - 2.0).abs() < 1e-9);
        assert!(signal.volume_ratio().is_some());
    }

    #[test]
    fn test_margin_not_cleared() {
        // 101 * 1.01 = 102.01
        let series = breakout_series(40, 102.0, 3_000.0);
        assert!(BreakoutStrategy::default().scan(&series, "TCS").unwrap().is_empty());
    }

    #[test]
    fn test_needs_twice_the_lookback() {
        let series = breakout_series(38, 112.0, 3_000.0);
        assert_eq!(series.len(), 39);
        assert!(BreakoutStrategy::default().scan(&series, "TCS").unwrap().is_empty());
    }

    #[test]
    fn test_low_volume_still_passes_threshold() {
        let series = breakout_series(40, 112.0, 500.0);
        let signals = BreakoutStrategy::default().scan(&series, "TCS").unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].confidence(), 0.4);
    }

    #[test]
    fn test_with_params_rejects_unknown_key() {
        let mut params = HashMap::new();
        params.insert("lookbak", 30.0);
        assert!(BreakoutStrategy::with_params(&params).is_err());
    }

    #[test]
    fn test_with_params_overrides() {
        let mut params = HashMap::new();
        params.insert("lookback", 10.0);
        params.insert("reward_multiple", 3.0);
        let strategy = BreakoutStrategy::with_params(&params).unwrap();
        assert_eq!(strategy.min_bars(), 20);
        assert_eq!(strategy.reward_multiple, 3.0);
        assert_eq!(strategy.stop_lookback.get(), 10);
    }
}
