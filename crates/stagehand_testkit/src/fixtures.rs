//! Test fixtures and staging helpers.
//!
//! Provides a staging area wired to an in-memory or temporary file store,
//! plus small frame builders for common test scenarios.

use stagehand_core::{HeadTracker, IncompleteIndex, IncompleteWriter, InputFrame, StagingConfig};
use stagehand_storage::{AtomKey, ColumnData, FileStore, InMemoryStore, SegmentStore, StreamId};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Writer, index and head tracker sharing one store.
pub struct TestStaging {
    /// The shared store.
    pub store: Arc<dyn SegmentStore>,
    /// Writer over `store`.
    pub writer: IncompleteWriter,
    /// Index over `store`.
    pub index: IncompleteIndex,
    /// Head tracker over `store`.
    pub heads: HeadTracker,
    memory: Option<Arc<InMemoryStore>>,
    temp_dir: Option<TempDir>,
}

impl TestStaging {
    fn over(
        store: Arc<dyn SegmentStore>,
        config: StagingConfig,
        memory: Option<Arc<InMemoryStore>>,
        temp_dir: Option<TempDir>,
    ) -> Self {
        Self {
            writer: IncompleteWriter::new(Arc::clone(&store), config),
            index: IncompleteIndex::new(Arc::clone(&store)),
            heads: HeadTracker::new(Arc::clone(&store)),
            store,
            memory,
            temp_dir,
        }
    }

    /// Creates a staging area over a fresh in-memory store.
    pub fn memory() -> Self {
        Self::memory_with(StagingConfig::default())
    }

    /// Creates a staging area over a fresh in-memory store with `config`.
    pub fn memory_with(config: StagingConfig) -> Self {
        let memory = Arc::new(InMemoryStore::new());
        Self::over(memory.clone(), config, Some(memory), None)
    }

    /// Creates a staging area over a file store in a new temporary directory.
    pub fn file() -> Self {
        Self::file_with(StagingConfig::default())
    }

    /// Creates a staging area over a file store in a new temporary directory
    /// with `config`.
    pub fn file_with(config: StagingConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path()).expect("Failed to open file store");
        Self::over(Arc::new(store), config, None, Some(temp_dir))
    }

    /// Returns the in-memory store for fault injection, if this fixture
    /// uses one.
    pub fn memory_store(&self) -> Option<&InMemoryStore> {
        self.memory.as_deref()
    }

    /// Returns the store root if file-based.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Reopens the file store at the same root, as a new process would.
    ///
    /// # Panics
    ///
    /// Panics if this fixture is not file-based.
    pub fn reopen(&self) -> Self {
        let root = self.path().expect("Only file-based fixtures can be reopened");
        let store = FileStore::open(root).expect("Failed to reopen file store");
        Self::over(Arc::new(store), self.writer.config().clone(), None, None)
    }

    /// Stages a row-count indexed frame covering `[start, end)` with one
    /// `Int64` column and returns its key.
    pub fn stage_rows(&self, stream: &StreamId, start: i64, end: i64) -> AtomKey {
        self.writer
            .append_incomplete(stream, row_frame(start, end), true)
            .expect("Failed to stage rows")
    }
}

/// Builds a row-count indexed frame covering `[start, end)` with a `value`
/// column holding the row numbers.
pub fn row_frame(start: i64, end: i64) -> InputFrame {
    let rows = u64::try_from(end - start).expect("end must not precede start");
    InputFrame::row_count_indexed(start, rows)
        .with_column("value", ColumnData::Int64((start..end).collect()))
}

/// Builds a timestamp indexed frame with a `value` column.
pub fn timestamp_frame(timestamps: Vec<i64>) -> InputFrame {
    let values = (0..timestamps.len()).map(|i| i as f64 * 0.5).collect();
    InputFrame::timestamp_indexed(timestamps).with_column("value", ColumnData::Float64(values))
}

/// Runs a test with a temporary in-memory staging area.
pub fn with_memory_staging<F, R>(f: F) -> R
where
    F: FnOnce(&TestStaging) -> R,
{
    let staging = TestStaging::memory();
    f(&staging)
}

/// Runs a test with a temporary file-backed staging area.
pub fn with_file_staging<F, R>(f: F) -> R
where
    F: FnOnce(&TestStaging) -> R,
{
    let staging = TestStaging::file();
    f(&staging)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fixture_exposes_store() {
        with_memory_staging(|staging| {
            assert!(staging.memory_store().is_some());
            assert!(staging.path().is_none());
        });
    }

    #[test]
    fn file_fixture_reopens() {
        with_file_staging(|staging| {
            let stream = StreamId::from("s");
            let key = staging.stage_rows(&stream, 0, 5);

            let reopened = staging.reopen();
            assert!(reopened.store.contains(&key).unwrap());
        });
    }

    #[test]
    fn frame_builders() {
        assert_eq!(row_frame(10, 14).num_rows(), 4);
        assert!(timestamp_frame(vec![3, 1]).check_index_monotonic().is_err());
    }
}
