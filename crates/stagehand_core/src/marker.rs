//! Per-stream staging marker.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use stagehand_storage::{codec, AtomKey, KeyKind, RefKey, SegmentStore, StreamId};

/// Record stored under a stream's `AppendRef`.
///
/// Its presence means staged data may exist for the stream. It is upserted
/// after every successful staging call and removed by cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingMarker {
    /// Most recent key staged by the call that wrote this marker.
    pub last_staged: AtomKey,
    /// Wall-clock time of that call, in nanoseconds since the Unix epoch.
    pub written_at: i64,
}

impl StagingMarker {
    /// Ref key of the marker for `stream_id`.
    #[must_use]
    pub fn ref_key(stream_id: &StreamId) -> RefKey {
        RefKey::new(KeyKind::AppendRef, stream_id.clone())
    }

    /// Upserts this marker for the stream of `last_staged`.
    pub(crate) fn store(&self, store: &dyn SegmentStore) -> CoreResult<()> {
        let bytes = codec::to_cbor(self).map_err(CoreError::from_write)?;
        store
            .write_ref(&Self::ref_key(self.last_staged.stream_id()), &bytes)
            .map_err(CoreError::from_write)
    }

    /// Reads the marker of `stream_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` if the marker cannot be decoded, and the store's
    /// error if the read fails for any reason other than absence.
    pub fn load(store: &dyn SegmentStore, stream_id: &StreamId) -> CoreResult<Option<Self>> {
        match store.read_ref(&Self::ref_key(stream_id)) {
            Ok(bytes) => Ok(Some(codec::from_cbor(&bytes).map_err(|e| {
                CoreError::corrupted(format!("staging marker of {stream_id}: {e}"))
            })?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
