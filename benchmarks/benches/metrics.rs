use atow::evaluation::{win_rate, Evaluator, Metrics};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

const SIZES: [usize; 4] = [100, 1_000, 10_000, 100_000];

fn sample(n: usize) -> (Vec<f64>, Vec<f64>) {
    let y_true: Vec<f64> = (0..n).map(|i| 50_000.0 + (i % 500) as f64 * 40.0).collect();
    let y_pred: Vec<f64> = y_true.iter().enumerate().map(|(i, y)| y + (i % 7) as f64 * 300.0 - 900.0).collect();
    (y_true, y_pred)
}

fn bench_single_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metric");
    for size in SIZES.iter() {
        let (y_true, y_pred) = sample(*size);
        group.bench_with_input(BenchmarkId::new("mse", size), size, |b, _| {
            b.iter(|| black_box(Metrics::mse(black_box(&y_true), black_box(&y_pred))));
        });
        group.bench_with_input(BenchmarkId::new("mae_stddev", size), size, |b, _| {
            b.iter(|| black_box(Metrics::mae_stddev(black_box(&y_true), black_box(&y_pred))));
        });
        group.bench_with_input(BenchmarkId::new("r_squared", size), size, |b, _| {
            b.iter(|| black_box(Metrics::r_squared(black_box(&y_true), black_box(&y_pred))));
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let evaluator = Evaluator::detailed();
    for size in SIZES.iter() {
        let (y_true, y_pred) = sample(*size);
        c.bench_with_input(BenchmarkId::new("evaluate", size), size, |b, _| {
            b.iter(|| black_box(evaluator.evaluate(black_box(&y_true), black_box(&y_pred))));
        });
    }
}

fn bench_win_rate(c: &mut Criterion) {
    for models in [2usize, 5, 10].iter() {
        let (y_true, base) = sample(10_000);
        let entries: Vec<(String, Vec<f64>)> = (0..*models)
            .map(|m| {
                let shifted = base.iter().map(|p| p + m as f64 * 25.0).collect();
                (format!("model_{}", m), shifted)
            })
            .collect();
        c.bench_with_input(BenchmarkId::new("win_rate", models), models, |b, _| {
            b.iter(|| black_box(win_rate(black_box(&y_true), black_box(&entries))));
        });
    }
}

criterion_group!(benches, bench_single_metrics, bench_evaluate, bench_win_rate);
criterion_main!(benches);
