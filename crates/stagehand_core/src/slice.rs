//! Staged segments as returned to readers.

use crate::error::CoreResult;
use stagehand_storage::{AtomKey, Segment, SegmentStore};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Placement of a staged segment in reconstructed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSlice {
    /// Absolute logical rows occupied, starting from the caller's `last_row`.
    pub row_range: Range<u64>,
    /// Columns covered.
    pub col_range: Range<usize>,
}

impl FrameSlice {
    /// Number of rows covered.
    #[must_use]
    pub fn num_rows(&self) -> u64 {
        self.row_range.end - self.row_range.start
    }
}

/// Access to a staged segment's payload.
///
/// `Loaded` holds the payload; `Deferred` holds the store handle and fetches
/// it on demand.
#[derive(Clone)]
pub enum SegmentHandle {
    /// Payload already read.
    Loaded(Segment),
    /// Payload left in the store.
    Deferred {
        /// Store holding the payload.
        store: Arc<dyn SegmentStore>,
        /// Key of the payload.
        key: AtomKey,
    },
}

impl SegmentHandle {
    /// Returns true if the payload is held in memory.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Returns the payload, reading it from the store if deferred.
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred read fails.
    pub fn fetch(&self) -> CoreResult<Segment> {
        match self {
            Self::Loaded(segment) => Ok(segment.clone()),
            Self::Deferred { store, key } => Ok(store.get(key)?),
        }
    }

    /// Reads a deferred payload and switches the handle to `Loaded`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails; the handle is then left deferred.
    pub fn load(&mut self) -> CoreResult<()> {
        if let Self::Deferred { store, key } = self {
            let segment = store.get(key)?;
            *self = Self::Loaded(segment);
        }
        Ok(())
    }

    /// Returns the payload if it is held in memory.
    #[must_use]
    pub fn loaded(&self) -> Option<&Segment> {
        match self {
            Self::Loaded(segment) => Some(segment),
            Self::Deferred { .. } => None,
        }
    }
}

impl fmt::Debug for SegmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded(segment) => f
                .debug_struct("Loaded")
                .field("rows", &segment.row_count())
                .finish(),
            Self::Deferred { key, .. } => f.debug_struct("Deferred").field("key", key).finish(),
        }
    }
}

/// A staged segment, its key and its placement.
#[derive(Debug, Clone)]
pub struct SliceAndKey {
    /// Payload accessor.
    pub segment: SegmentHandle,
    /// Key the segment is stored under.
    pub key: AtomKey,
    /// Placement in reconstructed order.
    pub slice: FrameSlice,
}

impl SliceAndKey {
    /// Returns the payload, reading it if deferred.
    ///
    /// # Errors
    ///
    /// Returns an error if a deferred read fails.
    pub fn fetch(&self) -> CoreResult<Segment> {
        self.segment.fetch()
    }
}
