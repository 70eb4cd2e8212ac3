//! Benchmark: allocator hot paths.
//!
//! Measures the O(log n) smallest-free-id search against a table shape
//! that defeats the free hint (scattered holes), plus commit/release
//! churn and lookup.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use idp_core::IdSlab;

/// Build a slab with 32 767 slots, ~3% free, holes scattered in clusters.
fn make_fragmented() -> IdSlab<u64> {
    let mut slab = IdSlab::with_capacity(32_767);
    for v in 0..32_767_u64 {
        slab.get_new(v).unwrap();
    }
    let mut pos = 40_usize;
    while pos + 8 < 32_767 {
        for id in pos..pos + 8 {
            slab.remove(id);
        }
        pos += 900;
    }
    slab
}

fn bench_find_free(c: &mut Criterion) {
    let slab = make_fragmented();

    let mut group = c.benchmark_group("find_free");

    group.bench_function("from_zero", |b| {
        b.iter(|| black_box(slab.find_free(black_box(0), 32_767)));
    });

    group.bench_function("from_midway", |b| {
        b.iter(|| black_box(slab.find_free(black_box(16_000), 32_767)));
    });

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    group.bench_function("alloc_remove_pair", |b| {
        let mut slab = make_fragmented();
        b.iter(|| {
            let id = slab.get_new(black_box(1_u64)).unwrap();
            slab.remove(id);
        });
    });

    group.bench_function("alloc_remove_pair_high_min", |b| {
        let mut slab = make_fragmented();
        b.iter(|| {
            let id = slab.get_new_above(black_box(1_u64), 30_000).unwrap();
            slab.remove(id);
        });
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let slab = make_fragmented();

    let mut group = c.benchmark_group("lookup");

    group.bench_function("get_hit", |b| {
        b.iter(|| black_box(slab.get(black_box(20_000))));
    });

    group.bench_function("get_miss_hole", |b| {
        b.iter(|| black_box(slab.get(black_box(42))));
    });

    group.finish();
}

criterion_group!(benches, bench_find_free, bench_churn, bench_lookup);
criterion_main!(benches);
