//! Concurrent staging stress helpers.
//!
//! These helpers drive many uncoordinated writers at one stream, the way
//! parallel ingestion jobs do.

use parking_lot::Mutex;
use stagehand_core::IncompleteWriter;
use stagehand_storage::{AtomKey, StreamId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::fixtures::row_frame;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }
}

/// Configuration for staging stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent writer threads.
    pub threads: usize,
    /// Staging calls per thread.
    pub writes_per_thread: usize,
    /// Rows per staged frame.
    pub rows_per_write: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            writes_per_thread: 25,
            rows_per_write: 16,
        }
    }
}

/// Keys staged by a concurrent run, with its timing.
#[derive(Debug, Clone)]
pub struct ConcurrentStaging {
    /// Every key returned by a successful staging call.
    pub keys: Vec<AtomKey>,
    /// Operation counts and timing.
    pub result: StressTestResult,
}

/// Stages frames on `stream` from `config.threads` threads at once.
///
/// Each thread writes its own disjoint row ranges, so the union of all
/// writes tiles `[0, threads * writes_per_thread * rows_per_write)`.
pub fn stress_concurrent_staging(
    writer: &IncompleteWriter,
    stream: &StreamId,
    config: &StressConfig,
) -> ConcurrentStaging {
    let keys = Arc::new(Mutex::new(Vec::new()));
    let failed = Arc::new(AtomicUsize::new(0));
    let rows = config.rows_per_write as i64;

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let writer = writer.clone();
            let stream = stream.clone();
            let keys = Arc::clone(&keys);
            let failed = Arc::clone(&failed);
            let writes = config.writes_per_thread;

            thread::spawn(move || {
                for i in 0..writes {
                    let first = ((t * writes + i) as i64) * rows;
                    let frame = row_frame(first, first + rows);
                    match writer.append_incomplete(&stream, frame, true) {
                        Ok(key) => keys.lock().push(key),
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Writer thread panicked");
    }

    let keys = std::mem::take(&mut *keys.lock());
    let result = StressTestResult::new(
        keys.len(),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    );
    ConcurrentStaging { keys, result }
}
