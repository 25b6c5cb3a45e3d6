//! Boolean event and threshold flags derived from indicator output
//!
//! Flags are advisory. Strategies are free to recompute what they need.
//! A comparison that involves an unavailable indicator value is `false`.

use serde::Serialize;

use crate::{indicators::IndicatorSeries, Bar};

/// Named condition flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Condition {
    GoldenCross,
    DeathCross,
    VolumeSurge,
    VolumeDry,
    RsiOversold,
    RsiOverbought,
    HigherHigh,
    HigherLow,
}

/// Flags aligned to the bar timeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConditionSeries {
    pub golden_cross: Vec<bool>,
    pub death_cross: Vec<bool>,
    pub volume_surge: Vec<bool>,
    pub volume_dry: Vec<bool>,
    pub rsi_oversold: Vec<bool>,
    pub rsi_overbought: Vec<bool>,
    pub higher_high: Vec<bool>,
    pub higher_low: Vec<bool>,
}

impl ConditionSeries {
    /// `len` positions with every flag cleared
    pub fn empty(len: usize) -> Self {
        Self {
            golden_cross: vec![false; len],
            death_cross: vec![false; len],
            volume_surge: vec![false; len],
            volume_dry: vec![false; len],
            rsi_oversold: vec![false; len],
            rsi_overbought: vec![false; len],
            higher_high: vec![false; len],
            higher_low: vec![false; len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.golden_cross.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.golden_cross.is_empty()
    }

    pub fn flags(&self, condition: Condition) -> &[bool] {
        match condition {
            Condition::GoldenCross => &self.golden_cross,
            Condition::DeathCross => &self.death_cross,
            Condition::VolumeSurge => &self.volume_surge,
            Condition::VolumeDry => &self.volume_dry,
            Condition::RsiOversold => &self.rsi_oversold,
            Condition::RsiOverbought => &self.rsi_overbought,
            Condition::HigherHigh => &self.higher_high,
            Condition::HigherLow => &self.higher_low,
        }
    }

    #[inline]
    pub fn is_set(&self, condition: Condition, index: usize) -> bool {
        self.flags(condition).get(index).copied().unwrap_or(false)
    }

    /// Bar positions where the flag is raised
    pub fn indices(&self, condition: Condition) -> Vec<usize> {
        self.flags(condition)
            .iter()
            .enumerate()
            .filter_map(|(i, &set)| set.then_some(i))
            .collect()
    }

    pub fn count(&self, condition: Condition) -> usize {
        self.flags(condition).iter().filter(|&&set| set).count()
    }
}

/// Threshold-based condition detector
#[derive(Debug, Clone)]
pub struct PatternConditionEngine {
    pub surge_ratio: f64,
    pub dry_ratio: f64,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for PatternConditionEngine {
    fn default() -> Self {
        Self {
            surge_ratio: 2.0,
            dry_ratio: 0.5,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl PatternConditionEngine {
    pub fn detect(&self, bars: &[Bar], indicators: &IndicatorSeries) -> ConditionSeries {
        let len = bars.len();
        let mut out = ConditionSeries::empty(len);

        for i in 0..len {
            out.golden_cross[i] = crossed_above(&indicators.ema_50, &indicators.ema_200, i);
            out.death_cross[i] = crossed_below(&indicators.ema_50, &indicators.ema_200, i);

            if let Some(ratio) = value_at(&indicators.volume_ratio, i) {
                out.volume_surge[i] = ratio > self.surge_ratio;
                out.volume_dry[i] = ratio < self.dry_ratio;
            }
            if let Some(rsi) = value_at(&indicators.rsi, i) {
                out.rsi_oversold[i] = rsi < self.oversold;
                out.rsi_overbought[i] = rsi > self.overbought;
            }

            if i > 0 {
                out.higher_high[i] = bars[i].high > bars[i - 1].high;
                out.higher_low[i] = bars[i].low > bars[i - 1].low;
            }
        }

        out
    }
}

#[inline]
fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

/// `fast` moved above `slow` at `index` relative to the previous bar
pub fn crossed_above(fast: &[Option<f64>], slow: &[Option<f64>], index: usize) -> bool {
    if index == 0 {
        return false;
    }
    match (
        value_at(fast, index),
        value_at(slow, index),
        value_at(fast, index - 1),
        value_at(slow, index - 1),
    ) {
        (Some(f), Some(s), Some(pf), Some(ps)) => f > s && pf <= ps,
        _ => false,
    }
}

/// `fast` moved below `slow` at `index` relative to the previous bar
pub fn crossed_below(fast: &[Option<f64>], slow: &[Option<f64>], index: usize) -> bool {
    if index == 0 {
        return false;
    }
    match (
        value_at(fast, index),
        value_at(slow, index),
        value_at(fast, index - 1),
        value_at(slow, index - 1),
    ) {
        (Some(f), Some(s), Some(pf), Some(ps)) => f < s && pf >= ps,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorEngine;
    use chrono::{Duration, TimeZone, Utc};

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Bar::new(start + Duration::days(i as i64), c, c + 1.0, c - 1.0, c, 1_000.0)
            })
            .collect()
    }

    #[test]
    fn test_crossing_helpers() {
        let fast = [Some(1.0), Some(2.0), Some(3.0), Some(1.0)];
        let slow = [Some(2.0), Some(2.0), Some(2.0), Some(2.0)];

        assert!(!crossed_above(&fast, &slow, 0));
        assert!(!crossed_above(&fast, &slow, 1)); // equal is not above
        assert!(crossed_above(&fast, &slow, 2));
        assert!(crossed_below(&fast, &slow, 3));
        assert!(!crossed_below(&fast, &slow, 2));
    }

    #[test]
    fn test_crossing_needs_available_values() {
        let fast = [None, Some(3.0)];
        let slow = [None, Some(2.0)];
        assert!(!crossed_above(&fast, &slow, 1));
    }

    #[test]
    fn test_golden_cross_fires_once_on_v_shape() {
        // 200 bars down from 200 to 100.5, then 100 bars straight up
        let closes: Vec<f64> = (0..200)
            .map(|i| 200.0 - 0.5 * i as f64)
            .chain((1..=100).map(|t| 100.0 + t as f64))
            .collect();
        let bars = bars_from_closes(&closes);
        let indicators = IndicatorEngine::default().compute(&bars).unwrap();
        let conditions = PatternConditionEngine::default().detect(&bars, &indicators);

        assert_eq!(conditions.indices(Condition::GoldenCross), vec![251]);
        assert_eq!(conditions.count(Condition::DeathCross), 1);
    }

    #[test]
    fn test_higher_high_and_low() {
        let bars = bars_from_closes(&[100.0, 101.0, 100.5]);
        let conditions =
            PatternConditionEngine::default().detect(&bars, &IndicatorSeries::unavailable(3));

        assert_eq!(conditions.higher_high, vec![false, true, false]);
        assert_eq!(conditions.higher_low, vec![false, true, false]);
        assert!(!conditions.is_set(Condition::VolumeSurge, 1));
    }

    #[test]
    fn test_rsi_and_volume_flags() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let mut bars = bars_from_closes(&closes);
        bars[25].volume = 5_000.0;
        bars[26].volume = 100.0;
        let indicators = IndicatorEngine::default().compute(&bars).unwrap();
        let conditions = PatternConditionEngine::default().detect(&bars, &indicators);

        assert!(conditions.is_set(Condition::RsiOverbought, 20));
        assert!(!conditions.is_set(Condition::RsiOversold, 20));
        assert!(conditions.is_set(Condition::VolumeSurge, 25));
        assert!(conditions.is_set(Condition::VolumeDry, 26));
        assert_eq!(conditions.count(Condition::VolumeSurge), 1);
    }
}
