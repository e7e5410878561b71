//! Submission and dispatch benchmarks.
//!
//! - `push_wait` - push N empty jobs one by one, then wait
//! - `guard_batch` - same N jobs pushed under one `PoolGuard`
//! - `fan_out` - one root job spawns N children through its `ParentRef`
//! - `callable` - calling an inline vs a heap-stored `UniqueFunction`

use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use taskpool_core::UniqueFunction;
use taskpool_runtime::{ParentRef, ThreadPool};

const JOBS: usize = 10_000;

fn bench_push_wait(c: &mut Criterion) {
    let threads = taskpool_core::hardware_concurrency().min(8);
    let pool = ThreadPool::new(threads);

    let mut group = c.benchmark_group("submit");
    group.throughput(Throughput::Elements(JOBS as u64));
    group.sample_size(20);

    group.bench_function(BenchmarkId::new("push_wait", threads), |b| {
        b.iter(|| {
            for _ in 0..JOBS {
                pool.push_back(|| {
                    black_box(1 + 1);
                });
            }
            pool.wait();
        });
    });

    group.bench_function(BenchmarkId::new("guard_batch", threads), |b| {
        b.iter(|| {
            {
                let mut guard = pool.lock();
                for _ in 0..JOBS {
                    guard.push_back(|| {
                        black_box(1 + 1);
                    });
                }
            }
            pool.wait();
        });
    });

    group.bench_function(BenchmarkId::new("fan_out", threads), |b| {
        b.iter(|| {
            let done = Arc::new(AtomicUsize::new(0));
            let d = done.clone();
            pool.push_back(move |parent: ParentRef<()>| {
                for _ in 0..JOBS {
                    let d = d.clone();
                    parent.push_back(move || {
                        d.fetch_add(1, Ordering::Relaxed);
                    });
                }
            });
            pool.wait();
            assert_eq!(done.load(Ordering::Relaxed), JOBS);
        });
    });

    group.finish();
}

fn bench_callable(c: &mut Criterion) {
    let mut group = c.benchmark_group("callable");

    let mut small: UniqueFunction<(u64,), u64> = UniqueFunction::new(|x: u64| x.wrapping_mul(3));
    group.bench_function("inline", |b| {
        b.iter(|| small.call((black_box(7),)))
    });

    let table = [5u64; 16];
    let mut large: UniqueFunction<(u64,), u64> =
        UniqueFunction::new(move |x: u64| x.wrapping_mul(table[(x & 15) as usize]));
    group.bench_function("heap", |b| {
        b.iter(|| large.call((black_box(7),)))
    });

    group.finish();
}

criterion_group!(benches, bench_push_wait, bench_callable);
criterion_main!(benches);
