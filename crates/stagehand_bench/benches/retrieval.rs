//! Staged segment retrieval benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stagehand_bench::{file_store, memory_store, populate};
use stagehand_core::{FilterRange, IncompleteIndex};
use stagehand_storage::StreamId;

/// Benchmark unconstrained get_incomplete, lazy and eager.
fn bench_get_incomplete_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_incomplete_memory");

    for segments in [10usize, 100, 1_000].iter() {
        let store = memory_store();
        let stream = StreamId::from("bench");
        populate(&store, &stream, *segments, 100);
        let index = IncompleteIndex::new(store);

        group.bench_with_input(BenchmarkId::new("lazy", segments), segments, |b, _| {
            b.iter(|| {
                let staged = index
                    .get_incomplete(&stream, FilterRange::Unconstrained, 0, false, false)
                    .unwrap();
                black_box(staged);
            });
        });
        group.bench_with_input(BenchmarkId::new("eager", segments), segments, |b, _| {
            b.iter(|| {
                let staged = index
                    .get_incomplete(&stream, FilterRange::Unconstrained, 0, false, true)
                    .unwrap();
                black_box(staged);
            });
        });
    }

    group.finish();
}

/// Benchmark listing versus streaming discovery with a narrow index filter.
fn bench_index_filter_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_filter_file");
    group.sample_size(20);

    let (store, _temp_dir) = file_store();
    let stream = StreamId::from("bench");
    populate(&store, &stream, 200, 100);
    let index = IncompleteIndex::new(store);
    let range = FilterRange::index(50_000_000_000..60_000_000_000);

    for via_iteration in [false, true] {
        group.bench_with_input(
            BenchmarkId::new("via_iteration", via_iteration),
            &via_iteration,
            |b, &via_iteration| {
                b.iter(|| {
                    let staged = index
                        .get_incomplete(&stream, black_box(range), 0, via_iteration, false)
                        .unwrap();
                    black_box(staged);
                });
            },
        );
    }

    group.bench_function("latest_incomplete_timestamp", |b| {
        b.iter(|| black_box(index.latest_incomplete_timestamp(&stream).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_get_incomplete_memory,
    bench_index_filter_file
);
criterion_main!(benches);
