//! Criterion benchmarks for SignalLab hot paths.
//!
//! Benchmarks:
//! 1. Horizon metrics over a full horizon set (uncached)
//! 2. Horizon metrics through a warm cache
//! 3. Stop-loss pass
//! 4. Filter pipeline over a signal batch

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use signallab_core::domain::{Direction, Signal};
use signallab_core::filter::{FilterPipeline, ThresholdFilter, VolatilityBandFilter, VolumeFloorFilter};
use signallab_core::horizon::{compute_horizon_metrics, HorizonAnalyzer, HorizonCache, HorizonConfig};
use signallab_core::stop_loss::apply_stop_loss;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_returns(n: usize) -> Vec<f64> {
    (0..n).map(|i| (i as f64 * 0.1).sin() * 0.01).collect()
}

fn make_positions(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| match (i / 7) % 3 {
            0 => 1.0,
            1 => 0.0,
            _ => -1.0,
        })
        .collect()
}

fn make_signals(n: usize) -> Vec<Signal> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let direction = if i % 2 == 0 { Direction::Long } else { Direction::Short };
            Signal::new(base + chrono::Duration::days(i as i64), direction, "bench")
                .with_feature("rsi", (i % 100) as f64)
                .with_feature("volume", 500.0 + (i % 1_000) as f64)
                .with_feature("atr", (i % 60) as f64 / 10.0)
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_horizon(c: &mut Criterion) {
    let mut group = c.benchmark_group("horizon_metrics");
    let horizons = [1, 3, 5, 10, 20];
    for n in [1_000usize, 10_000] {
        let returns = make_returns(n);
        let positions = make_positions(n);
        group.bench_with_input(BenchmarkId::new("uncached", n), &n, |b, _| {
            b.iter(|| {
                compute_horizon_metrics(black_box(&positions), black_box(&returns), &horizons, 20)
            })
        });
    }
    group.finish();
}

fn bench_horizon_cached(c: &mut Criterion) {
    let returns = make_returns(10_000);
    let positions = make_positions(10_000);
    let analyzer = HorizonAnalyzer::new(HorizonConfig::default()).unwrap();
    let cache = HorizonCache::new(64, 8).unwrap();
    let _ = analyzer.compute(&positions, &returns, Some(&cache));
    c.bench_function("horizon_metrics_cache_hit", |b| {
        b.iter(|| analyzer.compute(black_box(&positions), black_box(&returns), Some(&cache)))
    });
}

fn bench_stop_loss(c: &mut Criterion) {
    let mut group = c.benchmark_group("stop_loss");
    for n in [1_000usize, 100_000] {
        let returns = make_returns(n);
        let positions = make_positions(n);
        group.bench_with_input(BenchmarkId::new("apply", n), &n, |b, _| {
            b.iter(|| apply_stop_loss(black_box(&returns), black_box(&positions), 0.02))
        });
    }
    group.finish();
}

fn bench_filter_pipeline(c: &mut Criterion) {
    let signals = make_signals(5_000);
    let pipeline = FilterPipeline::new(vec![
        Box::new(ThresholdFilter::rsi_default()),
        Box::new(VolumeFloorFilter::new("volume", 1_000.0).unwrap()),
        Box::new(VolatilityBandFilter::new("atr", 0.5, 5.0).unwrap()),
    ]);
    c.bench_function("filter_pipeline_5k", |b| b.iter(|| pipeline.apply_mask(black_box(&signals))));
}

criterion_group!(
    benches,
    bench_horizon,
    bench_horizon_cached,
    bench_stop_loss,
    bench_filter_pipeline
);
criterion_main!(benches);
