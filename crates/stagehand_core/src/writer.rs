//! Staging writes.
//!
//! Every staged segment gets its own [`AtomKey`] with a fresh random
//! version id, so concurrent writers never coordinate and never collide.
//! Slices of one call get strictly increasing creation times, so slices
//! sharing a start index still read back in write order.
//! After the segments of a call are durable, the stream's staging marker is
//! upserted.

use crate::config::StagingConfig;
use crate::error::{CoreError, CoreResult};
use crate::frame::{validate_columns, validate_index_range, InputFrame};
use crate::marker::StagingMarker;
use stagehand_storage::{
    codec, current_timestamp_ns, AtomKey, AtomKeyBuilder, KeyKind, Segment, SegmentStore, StreamId,
};
use std::sync::Arc;
use tracing::debug;

/// Stages frames and segments as incomplete data.
///
/// # Example
///
/// ```rust
/// use stagehand_core::{InputFrame, IncompleteWriter, StagingConfig};
/// use stagehand_storage::{ColumnData, InMemoryStore, StreamId};
/// use std::sync::Arc;
///
/// let writer = IncompleteWriter::new(
///     Arc::new(InMemoryStore::new()),
///     StagingConfig::new().segment_row_size(2),
/// );
/// let frame = InputFrame::timestamp_indexed(vec![10, 20, 30])
///     .with_column("qty", ColumnData::Int64(vec![1, 2, 3]));
///
/// let keys = writer.write_parallel(&StreamId::from("sym"), &frame, true).unwrap();
/// assert_eq!(keys.len(), 2);
/// assert_eq!((keys[0].start_index(), keys[0].end_index()), (10, 21));
/// ```
#[derive(Clone)]
pub struct IncompleteWriter {
    store: Arc<dyn SegmentStore>,
    config: StagingConfig,
}

impl IncompleteWriter {
    /// Creates a writer over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SegmentStore>, config: StagingConfig) -> Self {
        Self { store, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StagingConfig {
        &self.config
    }

    /// Stages a frame as one or more segments of at most
    /// `segment_row_size` rows.
    ///
    /// Returns the keys written, in slice order. An empty frame stages
    /// nothing. If a write fails partway, segments already written stay
    /// staged.
    ///
    /// # Errors
    ///
    /// - `InvalidFrame` if the frame is malformed
    /// - `InvalidIndex` if `validate_index` is set and the index decreases
    /// - `StorageWriteFailed` if a write fails
    pub fn write_parallel(
        &self,
        stream_id: &StreamId,
        frame: &InputFrame,
        validate_index: bool,
    ) -> CoreResult<Vec<AtomKey>> {
        Self::validate(frame, validate_index)?;
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let created = current_timestamp_ns();
        let ranges = frame.slice_ranges(self.config.segment_row_size);
        let mut keys = Vec::with_capacity(ranges.len());
        for (slice, rows) in ranges.into_iter().enumerate() {
            let segment = frame.slice_to_segment(rows);
            let creation_ts = created.saturating_add(slice as i64);
            keys.push(self.stage(stream_id, &segment, creation_ts)?);
        }

        if let Some(last) = keys.last() {
            self.mark_staged(last)?;
        }
        Ok(keys)
    }

    /// Stages a whole frame as exactly one segment.
    ///
    /// # Errors
    ///
    /// - `InvalidFrame` if the frame is malformed or empty
    /// - `InvalidIndex` if `validate_index` is set and the index decreases
    /// - `StorageWriteFailed` if a write fails
    pub fn append_incomplete(
        &self,
        stream_id: &StreamId,
        frame: InputFrame,
        validate_index: bool,
    ) -> CoreResult<AtomKey> {
        Self::validate(&frame, validate_index)?;
        if frame.is_empty() {
            return Err(CoreError::invalid_frame("cannot stage an empty frame"));
        }

        let key = self.stage(stream_id, &frame.into_segment(), current_timestamp_ns())?;
        self.mark_staged(&key)?;
        Ok(key)
    }

    /// Stages an already built segment without checking its index order.
    ///
    /// # Errors
    ///
    /// - `InvalidFrame` if the segment is malformed, empty or its index
    ///   range end overflows
    /// - `StorageWriteFailed` if a write fails
    pub fn append_incomplete_segment(
        &self,
        stream_id: &StreamId,
        segment: Segment,
    ) -> CoreResult<AtomKey> {
        validate_index_range(segment.index())?;
        validate_columns(segment.row_count(), segment.columns())?;
        if segment.row_count() == 0 {
            return Err(CoreError::invalid_frame("cannot stage an empty segment"));
        }

        let key = self.stage(stream_id, &segment, current_timestamp_ns())?;
        self.mark_staged(&key)?;
        Ok(key)
    }

    fn validate(frame: &InputFrame, validate_index: bool) -> CoreResult<()> {
        frame.validate_structure()?;
        if validate_index {
            frame.check_index_monotonic()?;
        }
        Ok(())
    }

    /// Keys and persists one non-empty segment.
    fn stage(
        &self,
        stream_id: &StreamId,
        segment: &Segment,
        creation_ts: i64,
    ) -> CoreResult<AtomKey> {
        let (start, end) = segment
            .index_bounds()
            .ok_or_else(|| CoreError::invalid_frame("cannot stage an empty segment"))?;
        let content_hash = codec::content_hash(segment).map_err(CoreError::from_write)?;

        let key = AtomKeyBuilder::new()
            .content_hash(content_hash)
            .creation_ts(creation_ts)
            .index_range(start, end)
            .build(stream_id.clone(), KeyKind::AppendData);

        self.store
            .put(&key, segment)
            .map_err(CoreError::from_write)?;

        debug!(stream = %stream_id, key = %key, rows = segment.row_count(), "staged segment");
        Ok(key)
    }

    fn mark_staged(&self, last: &AtomKey) -> CoreResult<()> {
        if !self.config.write_staging_marker {
            return Ok(());
        }
        StagingMarker {
            last_staged: last.clone(),
            written_at: current_timestamp_ns(),
        }
        .store(self.store.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_storage::{ColumnData, InMemoryStore, IndexValue, SegmentIndex};

    fn writer_with(config: StagingConfig) -> (Arc<InMemoryStore>, IncompleteWriter) {
        let store = Arc::new(InMemoryStore::new());
        let writer = IncompleteWriter::new(store.clone(), config);
        (store, writer)
    }

    fn staged_keys(store: &InMemoryStore, stream: &StreamId) -> Vec<AtomKey> {
        store.list_keys(KeyKind::AppendData, Some(stream)).unwrap()
    }

    #[test]
    fn write_parallel_slices_by_row_size() {
        let (store, writer) = writer_with(StagingConfig::new().segment_row_size(4));
        let stream = StreamId::from("s");
        let frame = InputFrame::row_count_indexed(100, 10)
            .with_column("v", ColumnData::Int64((0..10).collect()));

        let keys = writer.write_parallel(&stream, &frame, true).unwrap();

        let ranges: Vec<_> = keys.iter().map(|k| (k.start_index(), k.end_index())).collect();
        assert_eq!(ranges, vec![(100, 104), (104, 108), (108, 110)]);
        assert_eq!(staged_keys(&store, &stream).len(), 3);
        assert_eq!(store.get(&keys[2]).unwrap().row_count(), 2);
    }

    #[test]
    fn timestamp_bounds_are_half_open() {
        let (_, writer) = writer_with(StagingConfig::default());
        let key = writer
            .append_incomplete(&"s".into(), InputFrame::timestamp_indexed(vec![5, 7, 9]), true)
            .unwrap();
        assert_eq!((key.start_index(), key.end_index()), (5, 10));
        assert_eq!(key.kind(), KeyKind::AppendData);
    }

    #[test]
    fn non_monotonic_index_rejected_when_validating() {
        let (store, writer) = writer_with(StagingConfig::default());
        let stream = StreamId::from("s");
        let frame = InputFrame::timestamp_indexed(vec![1, 3, 2]);

        let err = writer.write_parallel(&stream, &frame, true).unwrap_err();
        assert!(matches!(err, CoreError::InvalidIndex { position: 2, .. }));
        assert!(staged_keys(&store, &stream).is_empty());
        assert!(StagingMarker::load(store.as_ref(), &stream).unwrap().is_none());

        assert_eq!(writer.write_parallel(&stream, &frame, false).unwrap().len(), 1);
    }

    #[test]
    fn malformed_frame_rejected_without_validation() {
        let (store, writer) = writer_with(StagingConfig::default());
        let frame = InputFrame::timestamp_indexed(vec![1, 2])
            .with_column("v", ColumnData::Bool(vec![true]));

        assert!(matches!(
            writer.append_incomplete(&"s".into(), frame, false),
            Err(CoreError::InvalidFrame { .. })
        ));
        assert_eq!(store.segment_count(), 0);
    }

    #[test]
    fn empty_frames() {
        let (store, writer) = writer_with(StagingConfig::default());
        let stream = StreamId::from("s");

        let keys = writer
            .write_parallel(&stream, &InputFrame::timestamp_indexed(vec![]), true)
            .unwrap();
        assert!(keys.is_empty());
        assert!(matches!(
            writer.append_incomplete(&stream, InputFrame::row_count_indexed(0, 0), true),
            Err(CoreError::InvalidFrame { .. })
        ));
        assert_eq!(store.segment_count(), 0);
    }

    #[test]
    fn segment_staged_without_index_check() {
        let (store, writer) = writer_with(StagingConfig::default());
        let segment = Segment::new(SegmentIndex::Timestamp(vec![9, 3]), vec![]);

        let key = writer
            .append_incomplete_segment(&"s".into(), segment.clone())
            .unwrap();
        assert_eq!((key.start_index(), key.end_index()), (3, 10));
        assert_eq!(store.get(&key).unwrap(), segment);
    }

    #[test]
    fn marker_records_last_key() {
        let (store, writer) = writer_with(StagingConfig::new().segment_row_size(1));
        let stream = StreamId::from(3u64);
        let keys = writer
            .write_parallel(&stream, &InputFrame::row_count_indexed(0, 3), true)
            .unwrap();

        let marker = StagingMarker::load(store.as_ref(), &stream).unwrap().unwrap();
        assert_eq!(Some(&marker.last_staged), keys.last());
    }

    #[test]
    fn marker_can_be_disabled() {
        let (store, writer) = writer_with(StagingConfig::new().write_staging_marker(false));
        let stream = StreamId::from("s");
        writer
            .append_incomplete(&stream, InputFrame::row_count_indexed(0, 3), true)
            .unwrap();

        assert!(StagingMarker::load(store.as_ref(), &stream).unwrap().is_none());
        assert_eq!(staged_keys(&store, &stream).len(), 1);
    }

    #[test]
    fn identical_frames_get_distinct_keys() {
        let (_, writer) = writer_with(StagingConfig::default());
        let stream = StreamId::from("s");
        let a = writer
            .append_incomplete(&stream, InputFrame::row_count_indexed(0, 3), true)
            .unwrap();
        let b = writer
            .append_incomplete(&stream, InputFrame::row_count_indexed(0, 3), true)
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn partial_write_keeps_prefix() {
        let (store, writer) = writer_with(StagingConfig::new().segment_row_size(2));
        let stream = StreamId::from("s");
        store.fail_writes_after(2);

        let err = writer
            .write_parallel(&stream, &InputFrame::row_count_indexed(0, 10), true)
            .unwrap_err();
        assert!(matches!(err, CoreError::StorageWriteFailed { .. }));

        let mut keys = staged_keys(&store, &stream);
        keys.sort();
        let ranges: Vec<_> = keys.iter().map(|k| (k.start_index(), k.end_index())).collect();
        assert_eq!(ranges, vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn index_range_overflow_rejected() {
        let (store, writer) = writer_with(StagingConfig::new().segment_row_size(4));
        let stream = StreamId::from("s");
        let max = IndexValue::MAX;

        for frame in [
            InputFrame::row_count_indexed(max - 2, 10),
            InputFrame::timestamp_indexed(vec![max - 5, max]),
        ] {
            assert!(matches!(
                writer.write_parallel(&stream, &frame, true),
                Err(CoreError::InvalidFrame { .. })
            ));
            assert!(matches!(
                writer.append_incomplete(&stream, frame, false),
                Err(CoreError::InvalidFrame { .. })
            ));
        }
        let segment = Segment::new(SegmentIndex::Timestamp(vec![max]), vec![]);
        assert!(matches!(
            writer.append_incomplete_segment(&stream, segment),
            Err(CoreError::InvalidFrame { .. })
        ));
        assert_eq!(store.segment_count(), 0);

        let keys = writer
            .write_parallel(&stream, &InputFrame::row_count_indexed(max - 10, 10), true)
            .unwrap();
        let ranges: Vec<_> = keys.iter().map(|k| (k.start_index(), k.end_index())).collect();
        assert_eq!(ranges, vec![(max - 10, max - 6), (max - 6, max - 2), (max - 2, max)]);
    }

    #[test]
    fn slices_sharing_a_start_keep_write_order() {
        let (_, writer) = writer_with(StagingConfig::new().segment_row_size(2));
        let frame = InputFrame::timestamp_indexed(vec![1, 1, 1, 1, 1, 1, 2])
            .with_column("v", ColumnData::Int64((0..7).collect()));

        let keys = writer.write_parallel(&"s".into(), &frame, true).unwrap();
        assert_eq!(keys.len(), 4);
        assert!(keys.windows(2).all(|w| w[0].creation_ts() < w[1].creation_ts()));

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, keys);
    }
}
