//! Per-stream head record.
//!
//! The head records the last key folded into the version chain by a
//! compactor and the cumulative row count at that point. Staging never
//! touches it; [`HeadTracker::write_head`] is the only mutator.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use stagehand_storage::{codec, AtomKey, KeyKind, RefKey, SegmentStore, StreamId};
use std::sync::Arc;
use tracing::{info, warn};

/// Last compacted state of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadRecord {
    /// Last key folded into the version chain.
    pub last_compacted_key: Option<AtomKey>,
    /// Cumulative rows in the version chain.
    pub total_rows: u64,
}

/// Reads and writes head records.
///
/// # Example
///
/// ```rust
/// use stagehand_core::HeadTracker;
/// use stagehand_storage::{AtomKeyBuilder, InMemoryStore, KeyKind, StreamId};
/// use std::sync::Arc;
///
/// let heads = HeadTracker::new(Arc::new(InMemoryStore::new()));
/// let stream = StreamId::from("sym");
/// assert_eq!(heads.read_head(&stream).unwrap(), (None, 0));
///
/// let key = AtomKeyBuilder::new().index_range(0, 100).build("sym", KeyKind::TableData);
/// heads.write_head(&key, 100).unwrap();
/// assert_eq!(heads.read_head(&stream).unwrap(), (Some(key), 100));
/// ```
#[derive(Clone)]
pub struct HeadTracker {
    store: Arc<dyn SegmentStore>,
}

impl HeadTracker {
    /// Creates a head tracker over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SegmentStore>) -> Self {
        Self { store }
    }

    fn ref_key(stream_id: &StreamId) -> RefKey {
        RefKey::new(KeyKind::HeadRef, stream_id.clone())
    }

    /// Returns the last compacted key and total rows of a stream.
    ///
    /// A stream without a head yields `(None, 0)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the read fails for any reason other
    /// than absence, and `Corrupted` if the record cannot be decoded.
    pub fn read_head(&self, stream_id: &StreamId) -> CoreResult<(Option<AtomKey>, u64)> {
        Ok(self
            .read_head_record(stream_id)?
            .map_or((None, 0), |record| {
                (record.last_compacted_key, record.total_rows)
            }))
    }

    /// Returns the head record of a stream, if any.
    ///
    /// # Errors
    ///
    /// Same as [`HeadTracker::read_head`].
    pub fn read_head_record(&self, stream_id: &StreamId) -> CoreResult<Option<HeadRecord>> {
        let bytes = match self.store.read_ref(&Self::ref_key(stream_id)) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(CoreError::unavailable(e.to_string())),
        };

        codec::from_cbor(&bytes)
            .map(Some)
            .map_err(|e| CoreError::corrupted(format!("head record of {stream_id}: {e}")))
    }

    /// Replaces the head of `next_key`'s stream.
    ///
    /// Row counts are expected to grow; a decrease is logged but written.
    ///
    /// # Errors
    ///
    /// Returns `StorageWriteFailed` if the record could not be persisted.
    pub fn write_head(&self, next_key: &AtomKey, total_rows: u64) -> CoreResult<()> {
        let stream_id = next_key.stream_id();

        // A head that can't be read doesn't block the write.
        if let Ok(Some(previous)) = self.read_head_record(stream_id) {
            if total_rows < previous.total_rows {
                warn!(
                    stream = %stream_id,
                    previous = previous.total_rows,
                    total_rows,
                    "head row count decreased"
                );
            }
        }

        let record = HeadRecord {
            last_compacted_key: Some(next_key.clone()),
            total_rows,
        };
        let bytes = codec::to_cbor(&record).map_err(CoreError::from_write)?;
        self.store
            .write_ref(&Self::ref_key(stream_id), &bytes)
            .map_err(CoreError::from_write)?;

        info!(stream = %stream_id, key = %next_key, total_rows, "head written");
        Ok(())
    }

    /// Removes the head of a stream. Removing an absent head succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageWriteFailed` if the delete fails.
    pub fn clear_head(&self, stream_id: &StreamId) -> CoreResult<()> {
        self.store
            .delete_ref(&Self::ref_key(stream_id))
            .map_err(CoreError::from_write)?;
        info!(stream = %stream_id, "head cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_storage::{AtomKeyBuilder, FileStore, InMemoryStore};
    use tempfile::TempDir;

    fn table_key(stream: &str, end: i64) -> AtomKey {
        AtomKeyBuilder::new()
            .index_range(0, end)
            .build(stream, KeyKind::TableData)
    }

    #[test]
    fn missing_head_is_empty() {
        let heads = HeadTracker::new(Arc::new(InMemoryStore::new()));
        assert_eq!(heads.read_head(&"nope".into()).unwrap(), (None, 0));
        assert_eq!(heads.read_head_record(&"nope".into()).unwrap(), None);
    }

    #[test]
    fn write_replaces_previous_head() {
        let heads = HeadTracker::new(Arc::new(InMemoryStore::new()));
        let first = table_key("s", 10);
        let second = table_key("s", 30);

        heads.write_head(&first, 10).unwrap();
        heads.write_head(&second, 30).unwrap();
        assert_eq!(heads.read_head(&"s".into()).unwrap(), (Some(second), 30));
    }

    #[test]
    fn decreasing_row_count_is_written() {
        let heads = HeadTracker::new(Arc::new(InMemoryStore::new()));
        heads.write_head(&table_key("s", 10), 10).unwrap();
        heads.write_head(&table_key("s", 5), 5).unwrap();
        assert_eq!(heads.read_head(&"s".into()).unwrap().1, 5);
    }

    #[test]
    fn heads_are_per_stream() {
        let heads = HeadTracker::new(Arc::new(InMemoryStore::new()));
        heads.write_head(&table_key("a", 10), 10).unwrap();
        assert_eq!(heads.read_head(&"b".into()).unwrap(), (None, 0));
    }

    #[test]
    fn unavailable_store_fails_read() {
        let store = Arc::new(InMemoryStore::new());
        let heads = HeadTracker::new(store.clone());
        store.set_unavailable(true);

        assert!(matches!(
            heads.read_head(&"s".into()),
            Err(CoreError::StorageUnavailable { .. })
        ));
    }

    #[test]
    fn failed_write_leaves_previous_head() {
        let store = Arc::new(InMemoryStore::new());
        let heads = HeadTracker::new(store.clone());
        let first = table_key("s", 10);
        heads.write_head(&first, 10).unwrap();

        store.fail_writes_after(0);
        assert!(matches!(
            heads.write_head(&table_key("s", 20), 20),
            Err(CoreError::StorageWriteFailed { .. })
        ));
        store.clear_faults();
        assert_eq!(heads.read_head(&"s".into()).unwrap(), (Some(first), 10));
    }

    #[test]
    fn undecodable_head_is_corrupted() {
        let store = Arc::new(InMemoryStore::new());
        store
            .write_ref(&RefKey::new(KeyKind::HeadRef, "s"), b"\xff")
            .unwrap();
        let heads = HeadTracker::new(store);

        assert!(matches!(
            heads.read_head(&"s".into()),
            Err(CoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn clear_head_is_idempotent() {
        let heads = HeadTracker::new(Arc::new(InMemoryStore::new()));
        heads.write_head(&table_key("s", 10), 10).unwrap();
        heads.clear_head(&"s".into()).unwrap();
        heads.clear_head(&"s".into()).unwrap();
        assert_eq!(heads.read_head(&"s".into()).unwrap(), (None, 0));
    }

    #[test]
    fn head_survives_reopening_file_store() {
        let dir = TempDir::new().unwrap();
        let key = table_key("s", 10);

        let heads = HeadTracker::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        heads.write_head(&key, 10).unwrap();
        drop(heads);

        let reopened = HeadTracker::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        assert_eq!(reopened.read_head(&"s".into()).unwrap(), (Some(key), 10));
    }
}
