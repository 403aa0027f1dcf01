//! Staging write benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stagehand_bench::{file_store, memory_store, random_frame};
use stagehand_core::{IncompleteWriter, StagingConfig};
use stagehand_storage::StreamId;

/// Benchmark write_parallel into an in-memory store.
fn bench_write_parallel_memory(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_parallel_memory");

    for rows in [1_000usize, 10_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, &rows| {
            let writer = IncompleteWriter::new(
                memory_store(),
                StagingConfig::new().segment_row_size(10_000),
            );
            let stream = StreamId::from("bench");
            let frame = random_frame(0, rows);

            b.iter(|| {
                let keys = writer.write_parallel(&stream, black_box(&frame), true).unwrap();
                black_box(keys);
            });
        });
    }

    group.finish();
}

/// Benchmark append_incomplete into a file store.
fn bench_append_incomplete_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_incomplete_file");

    // fsync per write
    group.sample_size(20);

    for rows in [100usize, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, &rows| {
            let (store, _temp_dir) = file_store();
            let writer = IncompleteWriter::new(store, StagingConfig::default());
            let stream = StreamId::from("bench");
            let frame = random_frame(0, rows);

            b.iter(|| {
                let key = writer
                    .append_incomplete(&stream, black_box(frame.clone()), true)
                    .unwrap();
                black_box(key);
            });
        });
    }

    group.finish();
}

/// Benchmark the cost of index validation on a large frame.
fn bench_index_validation(c: &mut Criterion) {
    let frame = random_frame(0, 100_000);

    c.bench_function("check_index_monotonic_100k", |b| {
        b.iter(|| black_box(&frame).check_index_monotonic().unwrap());
    });
}

criterion_group!(
    benches,
    bench_write_parallel_memory,
    bench_append_incomplete_file,
    bench_index_validation,
);
criterion_main!(benches);
