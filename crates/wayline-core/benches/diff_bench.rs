//! # Reconciler Benchmarks
//!
//! Performance benchmarks for the stack reconciler and sync.
//!
//! Run with: `cargo bench -p wayline-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use futures::executor::block_on;
use std::hint::black_box;
use wayline_core::{NavigationStack, Route, RouteKind, StackReconciler};

#[derive(Debug)]
struct Screen(u32);

impl Route for Screen {
    type Output = ();

    fn kind(&self) -> RouteKind {
        RouteKind::new("screen")
    }

    fn same_route(&self, other: &Self) -> Option<bool> {
        Some(self.0 == other.0)
    }
}

/// Sequence of `size` distinct ids.
fn ascending(size: u32) -> Vec<u32> {
    (0..size).collect()
}

/// Same sequence with every tenth element replaced.
fn sparse_edit(size: u32) -> Vec<u32> {
    (0..size)
        .map(|i| if i % 10 == 0 { i + size } else { i })
        .collect()
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_diff_identical(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_identical");

    for size in [8u32, 64, 512].iter() {
        let sequence = ascending(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &sequence, |b, seq| {
            b.iter(|| black_box(StackReconciler::diff(seq, seq)));
        });
    }

    group.finish();
}

fn bench_diff_sparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_sparse");

    for size in [8u32, 64, 512].iter() {
        let previous = ascending(*size);
        let next = sparse_edit(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(StackReconciler::diff(&previous, &next)));
        });
    }

    group.finish();
}

fn bench_diff_disjoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_disjoint");

    for size in [8u32, 64, 256].iter() {
        let previous = ascending(*size);
        let next: Vec<u32> = previous.iter().map(|i| i + size).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(StackReconciler::diff(&previous, &next)));
        });
    }

    group.finish();
}

fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack_sync");

    for size in [8u32, 32].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let stack = NavigationStack::<Screen>::new();
                block_on(stack.sync(ascending(size).into_iter().map(Screen))).expect("sync");
                block_on(stack.sync(sparse_edit(size).into_iter().map(Screen))).expect("sync");
                black_box(stack.len())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_diff_identical,
    bench_diff_sparse,
    bench_diff_disjoint,
    bench_sync,
);

criterion_main!(benches);
