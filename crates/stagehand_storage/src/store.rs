//! Store facade trait definition.

use crate::error::StorageResult;
use crate::key::{AtomKey, KeyKind, RefKey, StreamId};
use crate::segment::{Segment, SegmentHeader};
use std::ops::ControlFlow;

/// A keyed store of immutable segments and mutable per-stream refs.
///
/// Stores know nothing about staging, compaction or heads; they persist
/// segments under [`AtomKey`]s and small records under [`RefKey`]s.
///
/// # Invariants
///
/// - `put` is atomic and durable once it returns: a concurrent `get` sees
///   either nothing or the complete segment
/// - a put key is visible to `list_keys`/`visit_keys` as soon as `put` returns
/// - `delete` and `delete_ref` succeed when the key is already absent
/// - `write_ref` replaces the previous record atomically; readers never
///   observe a torn record
/// - listing order is unspecified
/// - stores must be `Send + Sync`; they are shared as `Arc<dyn SegmentStore>`
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait SegmentStore: Send + Sync {
    /// Writes a segment under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::WriteFailed`] if the write did not complete.
    fn put(&self, key: &AtomKey, segment: &Segment) -> StorageResult<()>;

    /// Reads the segment stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if the key is absent.
    fn get(&self, key: &AtomKey) -> StorageResult<Segment>;

    /// Reads the header of the segment stored under `key` without its payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if the key is absent.
    fn read_header(&self, key: &AtomKey) -> StorageResult<SegmentHeader>;

    /// Visits every key of `kind`, optionally restricted to one stream.
    ///
    /// The visitor returns [`ControlFlow::Break`] to stop early.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Unavailable`] if the listing fails.
    fn visit_keys(
        &self,
        kind: KeyKind,
        stream_id: Option<&StreamId>,
        visitor: &mut dyn FnMut(AtomKey) -> ControlFlow<()>,
    ) -> StorageResult<()>;

    /// Lists every key of `kind`, optionally restricted to one stream.
    ///
    /// An empty listing is a valid result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Unavailable`] if the listing fails.
    fn list_keys(&self, kind: KeyKind, stream_id: Option<&StreamId>) -> StorageResult<Vec<AtomKey>> {
        let mut keys = Vec::new();
        self.visit_keys(kind, stream_id, &mut |key| {
            keys.push(key);
            ControlFlow::Continue(())
        })?;
        Ok(keys)
    }

    /// Returns true if a segment is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn contains(&self, key: &AtomKey) -> StorageResult<bool>;

    /// Deletes the segment stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails. Absence is not an error.
    fn delete(&self, key: &AtomKey) -> StorageResult<()>;

    /// Atomically writes (or replaces) the record stored under `ref_key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::WriteFailed`] if the write did not complete.
    fn write_ref(&self, ref_key: &RefKey, record: &[u8]) -> StorageResult<()>;

    /// Reads the record stored under `ref_key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if the ref is absent.
    fn read_ref(&self, ref_key: &RefKey) -> StorageResult<Vec<u8>>;

    /// Deletes the record stored under `ref_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails. Absence is not an error.
    fn delete_ref(&self, ref_key: &RefKey) -> StorageResult<()>;

    /// Lists the streams that have a ref of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Unavailable`] if the listing fails.
    fn list_refs(&self, kind: KeyKind) -> StorageResult<Vec<StreamId>>;
}
