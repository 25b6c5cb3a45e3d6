//! Property tests for signal and ranking invariants.
//!
//! Uses proptest to verify:
//! 1. Reward-to-risk follows the level formula for both sides
//! 2. Ranked output respects thresholds, the per-asset cap and confidence order
//! 3. Ranking does not depend on input order
//! 4. Series shorter than a strategy's history requirement yield no signals
//! 5. Scanner output on long random walks honours the acceptance contract and
//!    never repeats a (symbol, setup, day) key

use chartscan::{
    indicators::IndicatorEngine,
    ranking::{rank_signals, FilterThresholds},
    scanner::ScannerBuilder,
    strategies::DEFAULT_MIN_RISK_REWARD,
    Bar, PriceLevels, Side, Signal,
};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_signal() -> impl Strategy<Value = Signal> {
    (
        prop::sample::select(vec!["RELIANCE", "TCS", "INFY", "ITC"]),
        prop::sample::select(vec!["Golden_Cross", "Simple_Breakout"]),
        0..30i64,
        arb_price(),
        0.5..20.0_f64,
        0.5..4.0_f64,
        0.0..1.0_f64,
    )
        .prop_map(|(symbol, setup, day, entry, risk, multiple, confidence)| {
            let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
            let levels = PriceLevels {
                entry,
                stop: entry - risk,
                target: entry + risk * multiple,
            };
            Signal::new(ts, symbol, setup, Side::Buy, levels, confidence)
        })
}

/// Daily bars from a bounded random walk, long enough for every builtin strategy
fn arb_walk() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((-3.0..3.0_f64, 500.0..4_000.0_f64), 260..320).prop_map(|steps| {
        let start = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
        let mut close = 100.0_f64;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (step, volume))| {
                let open = close;
                close = (close + step).max(5.0);
                let high = open.max(close) + 0.5;
                let low = open.min(close) - 0.5;
                Bar::new(start + Duration::days(i as i64), open, high, low, close, volume)
            })
            .collect()
    })
}

fn arb_signals() -> impl Strategy<Value = Vec<Signal>> {
    prop::collection::vec(arb_signal(), 0..40)
}

// ── 1. Reward-to-risk ────────────────────────────────────────────────

proptest! {
    #[test]
    fn buy_risk_reward_formula(entry in arb_price(), risk in 0.01..50.0_f64, reward in 0.0..100.0_f64) {
        let levels = PriceLevels { entry, stop: entry - risk, target: entry + reward };
        let expected = ((entry + reward) - entry).abs() / (entry - (entry - risk)).abs();
        prop_assert!((levels.risk_reward(Side::Buy) - expected).abs() < 1e-9);
    }

    #[test]
    fn sell_risk_reward_formula(entry in arb_price(), risk in 0.01..50.0_f64, reward in 0.0..5.0_f64) {
        let levels = PriceLevels { entry, stop: entry + risk, target: entry - reward };
        let expected = (entry - (entry - reward)).abs() / ((entry + risk) - entry).abs();
        prop_assert!((levels.risk_reward(Side::Sell) - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_risk_reads_zero(entry in arb_price(), target in arb_price()) {
        let levels = PriceLevels { entry, stop: entry, target };
        prop_assert_eq!(levels.risk_reward(Side::Buy), 0.0);
        prop_assert_eq!(levels.risk_reward(Side::Sell), 0.0);
    }
}

// ── 2. Ranked output shape ───────────────────────────────────────────

proptest! {
    #[test]
    fn ranking_respects_thresholds_and_cap(signals in arb_signals(), cap in 1usize..4) {
        let thresholds = FilterThresholds { max_per_asset: cap, ..Default::default() };
        let ranked = rank_signals(&signals, &thresholds);

        let mut per_symbol: HashMap<&str, usize> = HashMap::new();
        for signal in &ranked {
            prop_assert!(signal.confidence() >= thresholds.min_confidence);
            prop_assert!(signal.risk_reward() >= thresholds.min_risk_reward);
            *per_symbol.entry(signal.symbol()).or_default() += 1;
        }
        prop_assert!(per_symbol.values().all(|&n| n <= cap));

        for pair in ranked.windows(2) {
            prop_assert!(pair[0].confidence() >= pair[1].confidence());
        }
    }
}

// ── 3. Order independence ────────────────────────────────────────────

proptest! {
    #[test]
    fn ranking_ignores_input_order(
        (original, shuffled) in arb_signals().prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let thresholds = FilterThresholds::default();
        prop_assert_eq!(rank_signals(&original, &thresholds), rank_signals(&shuffled, &thresholds));
    }
}

// ── 4. Short history ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn short_series_yields_no_signals(closes in prop::collection::vec(arb_price(), 0..40)) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), c, c + 1.0, c - 1.0, c, 1_000.0))
            .collect();
        let series = IndicatorEngine::default().enrich(bars);

        let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
        let scan = scanner.scan_asset(&series, "SHORT");
        prop_assert!(scan.signals.is_empty());
        prop_assert!(scan.failures.is_empty());
    }
}

// ── 5. Scanner output contract ───────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn scanner_output_honours_contract(first in arb_walk(), second in arb_walk()) {
        let first = Arc::new(IndicatorEngine::default().enrich(first));
        let second = Arc::new(IndicatorEngine::default().enrich(second));

        let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
        let batch = scanner.scan_many(vec![
            ("ALPHA", Arc::clone(&first)),
            ("BETA.NS", second),
            ("ALPHA.NS", first),
        ]);
        prop_assert!(batch.failures.is_empty());

        let mut keys = HashSet::new();
        for signal in &batch.signals {
            prop_assert!(signal.risk_reward() >= DEFAULT_MIN_RISK_REWARD);

            let (entry, stop, target) = (signal.entry(), signal.stop(), signal.target());
            let (risk, reward) = match signal.side() {
                Side::Buy => ((entry - stop).abs(), (target - entry).abs()),
                Side::Sell => ((stop - entry).abs(), (entry - target).abs()),
            };
            prop_assert_eq!(signal.risk_reward(), reward / risk);
            prop_assert!((0.0..=1.0).contains(&signal.confidence()));

            let key = (signal.symbol().to_string(), signal.setup(), signal.trading_day());
            prop_assert!(keys.insert(key), "repeated key for {}", signal.symbol());
        }
    }
}
