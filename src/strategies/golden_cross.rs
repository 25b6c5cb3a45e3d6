//! Golden cross: EMA50 crossing above EMA200

use std::collections::HashMap;

use super::helpers::{accept, volume_confidence, DEFAULT_MIN_RISK_REWARD};
use super::Strategy;
use crate::{
    conditions::crossed_above,
    indicators::LONG_WINDOW,
    params::{check_known, get_ratio, get_value, ParamMeta, ParameterizedStrategy},
    EnrichedSeries, PriceLevels, Ratio, Result, Side, Signal, SignalError,
};

/// Setup name of golden-cross signals
pub const GOLDEN_CROSS: &str = "Golden_Cross";

/// Buys the bar where EMA50 closes above EMA200 after being at or below it.
///
/// Stop sits a fixed fraction under EMA50, target a fixed percentage over entry.
/// A close above EMA200 adds a confidence bonus that saturates at 1.0.
#[derive(Debug, Clone)]
pub struct GoldenCrossStrategy {
    /// stop = EMA50 * stop_ema_factor
    pub stop_ema_factor: Ratio,
    /// target = entry * (1 + target_pct)
    pub target_pct: Ratio,
    /// Added to volume confidence when close > EMA200
    pub trend_bonus: Ratio,
    pub min_risk_reward: f64,
}

impl Default for GoldenCrossStrategy {
    fn default() -> Self {
        Self {
            stop_ema_factor: Ratio::new_const(0.95),
            target_pct: Ratio::new_const(0.15),
            trend_bonus: Ratio::new_const(0.2),
            min_risk_reward: DEFAULT_MIN_RISK_REWARD,
        }
    }
}

impl Strategy for GoldenCrossStrategy {
    fn name(&self) -> &'static str {
        GOLDEN_CROSS
    }

    fn min_bars(&self) -> usize {
        LONG_WINDOW
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
        let (fast, slow) = (&indicators.ema_50, &indicators.ema_200);
        let mut signals = Vec::new();

        for i in self.min_bars()..bars.len() {
            if !crossed_above(fast, slow, i) {
                continue;
            }
            let (Some(ema_50), Some(ema_200)) = (fast[i], slow[i]) else {
                continue;
            };

            let entry = bars[i].close;
            let levels = PriceLevels {
                entry,
                stop: ema_50 * self.stop_ema_factor.get(),
                target: entry * (1.0 + self.target_pct.get()),
            };

            let mut confidence = volume_confidence(bars, i);
            if entry > ema_200 {
                confidence += self.trend_bonus.get();
            }

            let candidate = Signal::new(
                bars[i].timestamp,
                symbol,
                GOLDEN_CROSS,
                Side::Buy,
                levels,
                confidence.min(1.0),
            )
            .with_volume_ratio(indicators.volume_ratio[i])
            .with_volatility(indicators.volatility[i]);

            signals.extend(accept(candidate, self.min_risk_reward));
        }

        Ok(signals)
    }

    fn validate_config(&self) -> Result<()> {
        if !self.min_risk_reward.is_finite() || self.min_risk_reward < 0.0 {
            return Err(SignalError::InvalidConfig(format!(
                "{GOLDEN_CROSS}: min_risk_reward must be finite and >= 0, got {}",
                self.min_risk_reward
            )));
        }
        Ok(())
    }
}

const GOLDEN_CROSS_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "stop_ema_factor",
        0.95,
        (0.8, 0.99),
        "Stop as a fraction of EMA50",
    ),
    ParamMeta::ratio(
        "target_pct",
        0.15,
        (0.05, 0.5),
        "Target distance above entry",
    ),
    ParamMeta::ratio(
        "trend_bonus",
        0.2,
        (0.0, 0.5),
        "Confidence bonus for a close above EMA200",
    ),
    ParamMeta::factor(
        "min_risk_reward",
        DEFAULT_MIN_RISK_REWARD,
        (0.1, 5.0),
        "Minimum reward-to-risk accepted",
    ),
];

impl ParameterizedStrategy for GoldenCrossStrategy {
    fn param_meta() -> &'static [ParamMeta] {
        GOLDEN_CROSS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        check_known(params, GOLDEN_CROSS_PARAMS)?;
        let strategy = Self {
            stop_ema_factor: get_ratio(params, GOLDEN_CROSS_PARAMS, "stop_ema_factor")?,
            target_pct: get_ratio(params, GOLDEN_CROSS_PARAMS, "target_pct")?,
            trend_bonus: get_ratio(params, GOLDEN_CROSS_PARAMS, "trend_bonus")?,
            min_risk_reward: get_value(params, GOLDEN_CROSS_PARAMS, "min_risk_reward")?,
        };
        strategy.validate_config()?;
        Ok(strategy)
    }

    fn setup_name() -> &'static str {
        GOLDEN_CROSS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{indicators::IndicatorEngine, Bar};
    use chrono::{Duration, TimeZone, Utc};

    /// 200 bars falling from 200, then 100 bars rising: one upward cross at bar 251
    fn v_shape() -> EnrichedSeries {
        let start = Utc.with_ymd_and_hms(2021, 1, 4, 0, 0, 0).unwrap();
        let bars = (0..200)
            .map(|i| 200.0 - 0.5 * i as f64)
            .chain((1..=100).map(|t| 100.0 + t as f64))
            .enumerate()
            .map(|(i, c)| Bar::new(start + Duration::days(i as i64), c, c + 1.0, c - 1.0, c, 1_000.0))
            .collect();
        IndicatorEngine::default().enrich(bars)
    }

    #[test]
    fn test_short_series_yields_nothing() {
        let bars = v_shape().bars()[..199].to_vec();
        let short = IndicatorEngine::default().enrich(bars);
        assert!(GoldenCrossStrategy::default().scan(&short, "X").unwrap().is_empty());
    }

    #[test]
    fn test_cross_fires_once() {
        let series = v_shape();
        let strategy = GoldenCrossStrategy {
            min_risk_reward: 0.5,
            ..Default::default()
        };
        let signals = strategy.scan(&series, "RELIANCE").unwrap();

        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.timestamp(), series.bars()[251].timestamp);
        assert_eq!(signal.setup(), GOLDEN_CROSS);
        assert_eq!(signal.side(), Side::Buy);
        assert_eq!(signal.entry(), 152.0);
        assert!((signal.target() - 152.0 * 1.15).abs() < 1e-9);
        // flat volume 0.6 plus the above-EMA200 bonus
        assert!((signal.confidence() - 0.8).abs() < 1e-12);
        assert!(signal.risk_reward() >= 0.5);
    }

    #[test]
    fn test_default_minimum_rejects_wide_stop() {
        // the stop under EMA50 is ~26 points away for a ~23 point target
        let signals = GoldenCrossStrategy::default().scan(&v_shape(), "RELIANCE").unwrap();
        assert!(signals.is_empty());
    }

    #[test]
    fn test_confidence_bonus_saturates() {
        let mut bars = v_shape().bars().to_vec();
        bars[251].volume = 5_000.0;
        let series = IndicatorEngine::default().enrich(bars);
        let strategy = GoldenCrossStrategy {
            min_risk_reward: 0.5,
            ..Default::default()
        };
        let signals = strategy.scan(&series, "RELIANCE").unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].confidence(), 1.0);
    }

    #[test]
    fn test_with_params() {
        let mut params = HashMap::new();
        params.insert("target_pct", 0.3);
        let strategy = GoldenCrossStrategy::with_params(&params).unwrap();
        assert_eq!(strategy.target_pct.get(), 0.3);
        assert_eq!(strategy.stop_ema_factor.get(), 0.95);

        params.insert("stop_ema_factor", 1.5);
        assert!(GoldenCrossStrategy::with_params(&params).is_err());
    }
}
