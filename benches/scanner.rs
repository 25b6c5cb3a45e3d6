//! Benchmarks for indicator derivation and scanning.

use std::sync::Arc;

use chartscan::prelude::*;
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Generate a deterministic wandering daily series
fn generate_bars(n: usize) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 0.98; // Deterministic "random"
        let spread = 1.0 + ((i * 3) % 10) as f64 / 5.0;
        let volume = 1_000.0 + ((i * 37) % 2_000) as f64;

        let open = price;
        let close = (price + change).max(1.0);
        bars.push(Bar::new(
            start + Duration::days(i as i64),
            open,
            open.max(close) + spread * 0.5,
            open.min(close) - spread * 0.5,
            close,
            volume,
        ));
        price = close;
    }

    bars
}

fn bench_enrich(c: &mut Criterion) {
    let mut group = c.benchmark_group("enrich");
    let engine = IndicatorEngine::default();

    for size in [250, 1_000, 2_500] {
        let bars = generate_bars(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &bars, |b, bars| {
            b.iter(|| engine.enrich(black_box(bars.clone())))
        });
    }

    group.finish();
}

fn bench_scan_asset(c: &mut Criterion) {
    let series = IndicatorEngine::default().enrich(generate_bars(1_000));
    let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();

    c.bench_function("scan_asset_1000", |b| {
        b.iter(|| scanner.scan_asset(black_box(&series), "BENCH"))
    });
}

fn bench_scan_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_many");
    let assets: Vec<(String, Arc<EnrichedSeries>)> = (0..50)
        .map(|i| {
            let series = IndicatorEngine::default().enrich(generate_bars(500 + i * 10));
            (format!("SYM{i}"), Arc::new(series))
        })
        .collect();

    for workers in [1, 3, 8] {
        let scanner = ScannerBuilder::new()
            .with_all_defaults()
            .max_workers(workers)
            .build()
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(workers), &assets, |b, assets| {
            b.iter(|| scanner.scan_many(black_box(assets.clone())))
        });
    }

    group.finish();
}

fn bench_rank(c: &mut Criterion) {
    let assets: Vec<(String, Arc<EnrichedSeries>)> = (0..50)
        .map(|i| {
            let series = IndicatorEngine::default().enrich(generate_bars(800 + i * 5));
            (format!("SYM{i}"), Arc::new(series))
        })
        .collect();
    let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
    let signals = scanner.scan_many(assets).signals;
    let thresholds = FilterThresholds::default();

    c.bench_function("rank_signals", |b| {
        b.iter(|| rank_signals(black_box(&signals), &thresholds))
    });
}

criterion_group!(benches, bench_enrich, bench_scan_asset, bench_scan_many, bench_rank);
criterion_main!(benches);
