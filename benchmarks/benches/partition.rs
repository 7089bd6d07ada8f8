use benchmarks::synthetic_flights;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

fn bench_split(c: &mut Criterion) {
    for size in [1_000usize, 10_000, 50_000].iter() {
        let Ok(dataset) = synthetic_flights(*size, 7) else {
            continue;
        };
        c.bench_with_input(BenchmarkId::new("split", size), size, |b, _| {
            b.iter(|| black_box(dataset.split(black_box(0.8), 0)));
        });
    }
}

fn bench_k_fold(c: &mut Criterion) {
    let Ok(dataset) = synthetic_flights(10_000, 7) else {
        return;
    };
    for k in [2usize, 5, 10].iter() {
        c.bench_with_input(BenchmarkId::new("k_fold_split", k), k, |b, &k| {
            b.iter(|| black_box(dataset.k_fold_split(black_box(k), 0)));
        });
    }
}

fn bench_fingerprint(c: &mut Criterion) {
    for size in [1_000usize, 10_000].iter() {
        let Ok(dataset) = synthetic_flights(*size, 7) else {
            continue;
        };
        c.bench_with_input(BenchmarkId::new("fingerprint", size), size, |b, _| {
            b.iter(|| black_box(dataset.fingerprint()));
        });
    }
}

criterion_group!(benches, bench_split, bench_k_fold, bench_fingerprint);
criterion_main!(benches);
