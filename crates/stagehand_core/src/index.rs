//! Discovery, retrieval and cleanup of staged segments.
//!
//! Store listings are unordered. Everything returned here is either a
//! `BTreeSet` or a `Vec` sorted by the [`AtomKey`] order, so callers see the
//! same order regardless of how the store enumerates keys.

use crate::error::{CoreError, CoreResult};
use crate::filter::{FilterRange, RowRange};
use crate::marker::StagingMarker;
use crate::slice::{FrameSlice, SegmentHandle, SliceAndKey};
use stagehand_storage::{AtomKey, IndexValue, KeyKind, SegmentStore, StreamId};
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info};

/// Overview of a stream's staged data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncompleteSummary {
    /// Number of staged segments.
    pub key_count: usize,
    /// Rows across all staged segments.
    pub total_rows: u64,
    /// Half-open index range covering every staged segment.
    pub index_bounds: Option<(IndexValue, IndexValue)>,
    /// Latest creation time among staged segments.
    pub latest_creation_ts: Option<i64>,
}

/// Reads and cleans up staged segments.
///
/// # Example
///
/// ```rust
/// use stagehand_core::{FilterRange, IncompleteIndex, IncompleteWriter, InputFrame, StagingConfig};
/// use stagehand_storage::{InMemoryStore, SegmentStore, StreamId};
/// use std::sync::Arc;
///
/// let store: Arc<dyn SegmentStore> = Arc::new(InMemoryStore::new());
/// let writer = IncompleteWriter::new(store.clone(), StagingConfig::default());
/// let index = IncompleteIndex::new(store);
/// let stream = StreamId::from("sym");
///
/// writer.append_incomplete(&stream, InputFrame::timestamp_indexed(vec![20, 21]), true).unwrap();
/// writer.append_incomplete(&stream, InputFrame::timestamp_indexed(vec![10, 11]), true).unwrap();
///
/// let staged = index
///     .get_incomplete(&stream, FilterRange::Unconstrained, 0, false, true)
///     .unwrap();
/// let starts: Vec<_> = staged.iter().map(|s| s.key.start_index()).collect();
/// assert_eq!(starts, vec![10, 20]);
/// assert_eq!(staged[1].slice.row_range, 2..4);
/// ```
#[derive(Clone)]
pub struct IncompleteIndex {
    store: Arc<dyn SegmentStore>,
}

impl IncompleteIndex {
    /// Creates an index over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SegmentStore>) -> Self {
        Self { store }
    }

    /// Returns every stream carrying a staging marker.
    ///
    /// This is a superset of the streams with staged data: a marker can
    /// outlive its segments until cleanup removes it.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the listing fails.
    pub fn get_incomplete_refs(&self) -> CoreResult<BTreeSet<StreamId>> {
        let streams: BTreeSet<_> = self.store.list_refs(KeyKind::AppendRef)?.into_iter().collect();
        debug!(count = streams.len(), "listed staging markers");
        Ok(streams)
    }

    /// Returns the streams carrying a staging marker that still have at
    /// least one staged segment.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if a listing fails.
    pub fn get_active_incomplete_refs(&self) -> CoreResult<BTreeSet<StreamId>> {
        let mut active = BTreeSet::new();
        for stream_id in self.get_incomplete_refs()? {
            if self.has_incomplete(&stream_id)? {
                active.insert(stream_id);
            }
        }
        Ok(active)
    }

    /// Returns every stream with staged segments, found by scanning the
    /// segment keys directly.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the listing fails.
    pub fn get_incomplete_symbols(&self) -> CoreResult<BTreeSet<StreamId>> {
        let mut streams = BTreeSet::new();
        self.store
            .visit_keys(KeyKind::AppendData, None, &mut |key| {
                if !streams.contains(key.stream_id()) {
                    streams.insert(key.stream_id().clone());
                }
                ControlFlow::Continue(())
            })?;
        debug!(count = streams.len(), "scanned staged streams");
        Ok(streams)
    }

    /// Returns true if the stream has at least one staged segment.
    ///
    /// Stops at the first key found.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the listing fails.
    pub fn has_incomplete(&self, stream_id: &StreamId) -> CoreResult<bool> {
        let mut found = false;
        self.store
            .visit_keys(KeyKind::AppendData, Some(stream_id), &mut |_| {
                found = true;
                ControlFlow::Break(())
            })?;
        Ok(found)
    }

    /// Returns the staged segments of a stream in reconstructed order.
    ///
    /// Keys are filtered by `range`, sorted by the [`AtomKey`] order and
    /// assigned consecutive absolute row ranges starting at `last_row`.
    /// Row offsets are computed over every key that survives the index
    /// filter, before any row filter, so row numbers are stable.
    ///
    /// With `via_iteration` the keys are filtered as the store streams them
    /// instead of after a full listing; the result is the same. With
    /// `load_data` every payload is read up front, otherwise handles are
    /// deferred.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if a listing or read fails, and
    /// `NotFound` if a listed segment disappears before it is read.
    pub fn get_incomplete(
        &self,
        stream_id: &StreamId,
        range: FilterRange,
        last_row: u64,
        via_iteration: bool,
        load_data: bool,
    ) -> CoreResult<Vec<SliceAndKey>> {
        let mut keys = if via_iteration {
            let mut keys = Vec::new();
            self.store
                .visit_keys(KeyKind::AppendData, Some(stream_id), &mut |key| {
                    if Self::key_matches(&key, &range) {
                        keys.push(key);
                    }
                    ControlFlow::Continue(())
                })?;
            keys
        } else {
            let mut keys = self.store.list_keys(KeyKind::AppendData, Some(stream_id))?;
            keys.retain(|key| Self::key_matches(key, &range));
            keys
        };
        keys.sort();

        let mut slices = Vec::with_capacity(keys.len());
        let mut offset = last_row;
        for key in keys {
            let header = self.store.read_header(&key)?;
            let rows = offset..offset + header.row_count;
            offset = rows.end;

            if let FilterRange::Rows(requested) = &range {
                if !requested.intersects(&RowRange::from(rows.clone())) {
                    continue;
                }
            }

            let segment = if load_data {
                SegmentHandle::Loaded(self.store.get(&key)?)
            } else {
                SegmentHandle::Deferred {
                    store: Arc::clone(&self.store),
                    key: key.clone(),
                }
            };
            slices.push(SliceAndKey {
                segment,
                key,
                slice: FrameSlice {
                    row_range: rows,
                    col_range: 0..header.column_names.len(),
                },
            });
        }

        debug!(
            stream = %stream_id,
            count = slices.len(),
            via_iteration,
            load_data,
            "retrieved staged segments"
        );
        Ok(slices)
    }

    fn key_matches(key: &AtomKey, range: &FilterRange) -> bool {
        match range {
            FilterRange::Index(bounds) => bounds.intersects(key.start_index(), key.end_index()),
            FilterRange::Unconstrained | FilterRange::Rows(_) => true,
        }
    }

    /// Deletes every staged segment of a stream, then its staging marker.
    ///
    /// Returns the number of segments deleted. Running it again deletes
    /// nothing and succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the listing fails and
    /// `StorageWriteFailed` if a delete fails.
    pub fn remove_incomplete_segments(&self, stream_id: &StreamId) -> CoreResult<usize> {
        let keys = self.store.list_keys(KeyKind::AppendData, Some(stream_id))?;
        for key in &keys {
            self.store.delete(key).map_err(CoreError::from_write)?;
        }
        self.store
            .delete_ref(&StagingMarker::ref_key(stream_id))
            .map_err(CoreError::from_write)?;

        info!(stream = %stream_id, removed = keys.len(), "removed staged segments");
        Ok(keys.len())
    }

    /// Deletes the staged segments of a stream that are not in `retain`.
    ///
    /// The staging marker is removed only when nothing is left staged.
    /// Returns the number of segments deleted.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if a listing fails and
    /// `StorageWriteFailed` if a delete fails.
    pub fn remove_incomplete_segments_except(
        &self,
        stream_id: &StreamId,
        retain: &BTreeSet<AtomKey>,
    ) -> CoreResult<usize> {
        let keys = self.store.list_keys(KeyKind::AppendData, Some(stream_id))?;
        let mut removed = 0;
        for key in keys.iter().filter(|key| !retain.contains(*key)) {
            self.store.delete(key).map_err(CoreError::from_write)?;
            removed += 1;
        }

        if !self.has_incomplete(stream_id)? {
            self.store
                .delete_ref(&StagingMarker::ref_key(stream_id))
                .map_err(CoreError::from_write)?;
        }

        info!(
            stream = %stream_id,
            removed,
            retained = keys.len() - removed,
            "removed staged segments"
        );
        Ok(removed)
    }

    /// Returns the latest creation time among a stream's staged segments.
    ///
    /// Reads keys only.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the listing fails.
    pub fn latest_incomplete_timestamp(&self, stream_id: &StreamId) -> CoreResult<Option<i64>> {
        let mut latest: Option<i64> = None;
        self.store
            .visit_keys(KeyKind::AppendData, Some(stream_id), &mut |key| {
                latest = latest.max(Some(key.creation_ts()));
                ControlFlow::Continue(())
            })?;
        Ok(latest)
    }

    /// Summarises a stream's staged data from keys and segment headers.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if a listing or read fails.
    pub fn incomplete_summary(&self, stream_id: &StreamId) -> CoreResult<IncompleteSummary> {
        let keys = self.store.list_keys(KeyKind::AppendData, Some(stream_id))?;

        let mut summary = IncompleteSummary {
            key_count: keys.len(),
            ..IncompleteSummary::default()
        };
        for key in &keys {
            summary.total_rows += self.store.read_header(key)?.row_count;
            summary.index_bounds = Some(match summary.index_bounds {
                Some((start, end)) => (start.min(key.start_index()), end.max(key.end_index())),
                None => (key.start_index(), key.end_index()),
            });
            summary.latest_creation_ts = summary.latest_creation_ts.max(Some(key.creation_ts()));
        }
        Ok(summary)
    }
}
