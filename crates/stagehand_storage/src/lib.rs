//! # Stagehand Storage
//!
//! Key model, segment model and keyed segment stores for Stagehand.
//!
//! This crate provides the lowest-level persistence abstraction used by the
//! staging layer. Stores are **keyed segment stores**: they persist immutable
//! segments under [`AtomKey`]s and small mutable records under [`RefKey`]s,
//! without knowing what staging, compaction or heads are.
//!
//! ## Design Principles
//!
//! - Each key is written atomically; there are no multi-key transactions
//! - Listings are unordered; callers sort by key
//! - Absence is reported as [`StorageError::NotFound`] on reads and is a
//!   no-op on deletes
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing, with fault injection
//! - [`FileStore`] - For persistent storage, one file per key
//!
//! ## Example
//!
//! ```rust
//! use stagehand_storage::{AtomKeyBuilder, InMemoryStore, KeyKind, SegmentStore, StreamId};
//! use stagehand_storage::{Column, ColumnData, Segment, SegmentIndex};
//!
//! let store = InMemoryStore::new();
//! let segment = Segment::new(
//!     SegmentIndex::Timestamp(vec![10, 11, 12]),
//!     vec![Column::new("px", ColumnData::Float64(vec![1.0, 1.5, 2.0]))],
//! );
//! let (start, end) = segment.index_bounds().unwrap();
//! let key = AtomKeyBuilder::new()
//!     .index_range(start, end)
//!     .build("prices", KeyKind::AppendData);
//!
//! store.put(&key, &segment).unwrap();
//! let keys = store
//!     .list_keys(KeyKind::AppendData, Some(&StreamId::from("prices")))
//!     .unwrap();
//! assert_eq!(keys, vec![key]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod error;
mod file;
mod key;
mod memory;
mod segment;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use key::{
    current_timestamp_ns, fresh_version_id, AtomKey, AtomKeyBuilder, IndexValue, KeyKind, RefKey,
    StreamId,
};
pub use memory::InMemoryStore;
pub use segment::{Column, ColumnData, Segment, SegmentHeader, SegmentIndex};
pub use store::SegmentStore;
