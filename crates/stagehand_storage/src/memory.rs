//! In-memory segment store for testing.

use crate::error::{StorageError, StorageResult};
use crate::key::{AtomKey, KeyKind, RefKey, StreamId};
use crate::segment::{Segment, SegmentHeader};
use crate::store::SegmentStore;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};

type Partition = BTreeMap<AtomKey, Segment>;

/// An in-memory segment store.
///
/// This store keeps all segments and refs in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral staging areas that don't need persistence
///
/// It also supports fault injection so tests can exercise failed and
/// partially completed writes.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use stagehand_storage::{
///     AtomKeyBuilder, InMemoryStore, KeyKind, Segment, SegmentIndex, SegmentStore,
/// };
///
/// let store = InMemoryStore::new();
/// let key = AtomKeyBuilder::new().index_range(0, 3).build("sym", KeyKind::AppendData);
/// let segment = Segment::new(SegmentIndex::RowCount { start_row: 0, rows: 3 }, vec![]);
///
/// store.put(&key, &segment).unwrap();
/// assert_eq!(store.get(&key).unwrap(), segment);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    segments: RwLock<BTreeMap<(KeyKind, StreamId), Partition>>,
    refs: RwLock<BTreeMap<RefKey, Vec<u8>>>,
    writes_before_failure: Mutex<Option<usize>>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the next `n` segment or ref writes succeed, then fails every
    /// write after them with [`StorageError::WriteFailed`].
    pub fn fail_writes_after(&self, n: usize) {
        *self.writes_before_failure.lock() = Some(n);
    }

    /// Makes every read and listing fail with [`StorageError::Unavailable`]
    /// until switched back off.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Removes any injected fault.
    pub fn clear_faults(&self) {
        *self.writes_before_failure.lock() = None;
        self.set_unavailable(false);
    }

    /// Returns the total number of stored segments across all kinds.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.read().values().map(BTreeMap::len).sum()
    }

    /// Clears all segments and refs.
    pub fn clear(&self) {
        self.segments.write().clear();
        self.refs.write().clear();
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("in-memory store marked unavailable"));
        }
        Ok(())
    }

    fn admit_write(&self, key: &str) -> StorageResult<()> {
        let mut remaining = self.writes_before_failure.lock();
        match remaining.as_mut() {
            Some(0) => Err(StorageError::write_failed(key, "injected write failure")),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn with_segment<T>(&self, key: &AtomKey, f: impl FnOnce(&Segment) -> T) -> StorageResult<T> {
        self.check_available()?;
        let segments = self.segments.read();
        segments
            .get(&(key.kind(), key.stream_id().clone()))
            .and_then(|partition| partition.get(key))
            .map(f)
            .ok_or_else(|| StorageError::not_found(key.encode()))
    }
}

impl SegmentStore for InMemoryStore {
    fn put(&self, key: &AtomKey, segment: &Segment) -> StorageResult<()> {
        self.admit_write(&key.encode())?;
        self.segments
            .write()
            .entry((key.kind(), key.stream_id().clone()))
            .or_default()
            .insert(key.clone(), segment.clone());
        Ok(())
    }

    fn get(&self, key: &AtomKey) -> StorageResult<Segment> {
        self.with_segment(key, Segment::clone)
    }

    fn read_header(&self, key: &AtomKey) -> StorageResult<SegmentHeader> {
        self.with_segment(key, Segment::header)
    }

    fn visit_keys(
        &self,
        kind: KeyKind,
        stream_id: Option<&StreamId>,
        visitor: &mut dyn FnMut(AtomKey) -> ControlFlow<()>,
    ) -> StorageResult<()> {
        self.check_available()?;

        // Snapshot first so the visitor can call back into the store.
        let snapshot: Vec<AtomKey> = {
            let segments = self.segments.read();
            segments
                .iter()
                .filter(|((k, s), _)| *k == kind && stream_id.map_or(true, |id| id == s))
                .flat_map(|(_, partition)| partition.keys().cloned())
                .collect()
        };

        for key in snapshot {
            if visitor(key).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn contains(&self, key: &AtomKey) -> StorageResult<bool> {
        self.check_available()?;
        Ok(self
            .segments
            .read()
            .get(&(key.kind(), key.stream_id().clone()))
            .is_some_and(|partition| partition.contains_key(key)))
    }

    fn delete(&self, key: &AtomKey) -> StorageResult<()> {
        let mut segments = self.segments.write();
        let partition_key = (key.kind(), key.stream_id().clone());
        if let Some(partition) = segments.get_mut(&partition_key) {
            partition.remove(key);
            if partition.is_empty() {
                segments.remove(&partition_key);
            }
        }
        Ok(())
    }

    fn write_ref(&self, ref_key: &RefKey, record: &[u8]) -> StorageResult<()> {
        self.admit_write(&ref_key.encode())?;
        self.refs.write().insert(ref_key.clone(), record.to_vec());
        Ok(())
    }

    fn read_ref(&self, ref_key: &RefKey) -> StorageResult<Vec<u8>> {
        self.check_available()?;
        self.refs
            .read()
            .get(ref_key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(ref_key.encode()))
    }

    fn delete_ref(&self, ref_key: &RefKey) -> StorageResult<()> {
        self.refs.write().remove(ref_key);
        Ok(())
    }

    fn list_refs(&self, kind: KeyKind) -> StorageResult<Vec<StreamId>> {
        self.check_available()?;
        Ok(self
            .refs
            .read()
            .keys()
            .filter(|r| r.kind() == kind)
            .map(|r| r.stream_id().clone())
            .collect())
    }
}
