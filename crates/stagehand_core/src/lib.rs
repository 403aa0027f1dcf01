//! # Stagehand Core
//!
//! Staging append layer for Stagehand.
//!
//! Data can be appended to a stream out of order and from many uncoordinated
//! writers without rewriting the stream's version chain. Each write lands as
//! an immutable, uniquely keyed *incomplete segment*; a compactor later folds
//! staged segments into the version chain and records its progress in the
//! stream's *head*.
//!
//! This crate provides:
//! - [`IncompleteWriter`] for staging frames and segments
//! - [`IncompleteIndex`] for discovering, retrieving and cleaning up staged
//!   segments in a single reconstructed order
//! - [`HeadTracker`] for the per-stream head record
//!
//! All components share one `Arc<dyn SegmentStore>` and hold no locks of
//! their own.
//!
//! ## Example
//!
//! ```rust
//! use stagehand_core::{FilterRange, HeadTracker, IncompleteIndex, IncompleteWriter};
//! use stagehand_core::{InputFrame, StagingConfig};
//! use stagehand_storage::{ColumnData, InMemoryStore, SegmentStore, StreamId};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn SegmentStore> = Arc::new(InMemoryStore::new());
//! let writer = IncompleteWriter::new(store.clone(), StagingConfig::default());
//! let index = IncompleteIndex::new(store.clone());
//! let heads = HeadTracker::new(store);
//! let stream = StreamId::from("trades");
//!
//! let frame = InputFrame::timestamp_indexed(vec![1_000, 2_000])
//!     .with_column("px", ColumnData::Float64(vec![10.5, 10.6]));
//! writer.append_incomplete(&stream, frame, true).unwrap();
//!
//! // A compactor consumes the staged data, advances the head and cleans up.
//! let (_, rows) = heads.read_head(&stream).unwrap();
//! let staged = index
//!     .get_incomplete(&stream, FilterRange::Unconstrained, rows, false, true)
//!     .unwrap();
//! let last = staged.last().unwrap();
//! heads.write_head(&last.key, last.slice.row_range.end).unwrap();
//! index.remove_incomplete_segments(&stream).unwrap();
//!
//! assert_eq!(heads.read_head(&stream).unwrap().1, 2);
//! assert!(!index.has_incomplete(&stream).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod filter;
mod frame;
pub mod head;
pub mod index;
mod marker;
mod slice;
pub mod writer;

pub use config::{StagingConfig, DEFAULT_SEGMENT_ROW_SIZE};
pub use error::{CoreError, CoreResult};
pub use filter::{FilterRange, IndexRange, RowRange};
pub use frame::InputFrame;
pub use head::{HeadRecord, HeadTracker};
pub use index::{IncompleteIndex, IncompleteSummary};
pub use marker::StagingMarker;
pub use slice::{FrameSlice, SegmentHandle, SliceAndKey};
pub use writer::IncompleteWriter;
