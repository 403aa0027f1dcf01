//! Benchmark utilities.

#![warn(missing_docs)]

use rand::seq::SliceRandom;
use rand::Rng;
use stagehand_core::{IncompleteWriter, InputFrame, StagingConfig};
use stagehand_storage::{ColumnData, FileStore, InMemoryStore, SegmentStore, StreamId};
use std::sync::Arc;
use tempfile::TempDir;

/// Generate a timestamp indexed frame of `rows` rows starting at `start`,
/// with random non-decreasing timestamps and two random columns.
pub fn random_frame(start: i64, rows: usize) -> InputFrame {
    let mut rng = rand::thread_rng();
    let mut ts = start;
    let timestamps = (0..rows)
        .map(|_| {
            ts += rng.gen_range(0..1_000);
            ts
        })
        .collect();
    let prices = (0..rows).map(|_| rng.gen_range(90.0..110.0)).collect();
    let sizes = (0..rows).map(|_| rng.gen_range(1..500)).collect();

    InputFrame::timestamp_indexed(timestamps)
        .with_column("px", ColumnData::Float64(prices))
        .with_column("qty", ColumnData::Int64(sizes))
}

/// Generate a fresh in-memory store.
pub fn memory_store() -> Arc<dyn SegmentStore> {
    Arc::new(InMemoryStore::new())
}

/// Generate a file store in a new temporary directory.
///
/// The directory is removed when the returned guard drops.
pub fn file_store() -> (Arc<dyn SegmentStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::open(temp_dir.path()).unwrap();
    (Arc::new(store), temp_dir)
}

/// Stage `segments` segments of `rows` rows each on `stream`, in shuffled
/// order.
pub fn populate(store: &Arc<dyn SegmentStore>, stream: &StreamId, segments: usize, rows: usize) {
    let writer = IncompleteWriter::new(Arc::clone(store), StagingConfig::default());
    let mut starts: Vec<i64> = (0..segments as i64).map(|i| i * 1_000_000_000).collect();
    starts.shuffle(&mut rand::thread_rng());

    for start in starts {
        writer
            .append_incomplete(stream, random_frame(start, rows), true)
            .unwrap();
    }
}
