//! Benchmarks for signal operators
//!
//! Run with: cargo bench -p rill-core

use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rill_core::scheduler::CurrentScheduler;
use rill_core::{Signal, VirtualScheduler};

/// Subscribe under a virtual scheduler so the whole pipeline runs inline,
/// returning how many values arrived.
fn drain<T: rill_core::Value>(signal: &Signal<T>) -> usize {
    let received = Arc::new(AtomicUsize::new(0));
    let counter = received.clone();
    let _current = CurrentScheduler::enter(Arc::new(VirtualScheduler::new()));
    signal.subscribe_next(move |value| {
        black_box(value);
        counter.fetch_add(1, Ordering::Relaxed);
    });
    received.load(Ordering::Relaxed)
}

fn bench_map_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("operators/map_filter");

    for n in [10, 100, 1_000, 10_000] {
        let signal = Signal::from_values(0..n as u64)
            .map(|x| x * 3)
            .filter(|x| x % 2 == 0);
        group.bench_with_input(BenchmarkId::from_parameter(n), &signal, |b, signal| {
            b.iter(|| drain(signal))
        });
    }

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("operators/scan");

    for n in [100, 1_000, 10_000] {
        let signal = Signal::from_values(0..n as u64).scan_with_start(0u64, |sum, x| sum + x);
        group.bench_with_input(BenchmarkId::from_parameter(n), &signal, |b, signal| {
            b.iter(|| drain(signal))
        });
    }

    group.finish();
}

fn bench_flatten_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("operators/flatten_map");

    for n in [100, 1_000] {
        let signal = Signal::from_values(0..n as u64).flatten_map(|x| Signal::from_values(vec![x, x + 1]));
        group.bench_with_input(BenchmarkId::from_parameter(n), &signal, |b, signal| {
            b.iter(|| drain(signal))
        });
    }

    group.finish();
}

fn bench_zip(c: &mut Criterion) {
    let mut group = c.benchmark_group("operators/zip");

    for n in [100, 1_000] {
        let left = Signal::from_values(0..n as u64);
        let right = Signal::from_values((0..n as u64).rev());
        let signal = left.zip_with(&right).reduce_each(|a, b| a + b);
        group.bench_with_input(BenchmarkId::from_parameter(n), &signal, |b, signal| {
            b.iter(|| drain(signal))
        });
    }

    group.finish();
}

fn bench_take_infinite(c: &mut Criterion) {
    let naturals = Signal::<u64>::create(|subscriber| {
        let mut next = 0;
        while !subscriber.is_disposed() {
            subscriber.send_next(next);
            next += 1;
        }
        None
    });

    c.bench_function("operators/take_100_of_infinite", |b| {
        let signal = naturals.take(100);
        b.iter(|| drain(&signal))
    });
}

criterion_group!(
    benches,
    bench_map_filter,
    bench_scan,
    bench_flatten_map,
    bench_zip,
    bench_take_infinite,
);
criterion_main!(benches);
