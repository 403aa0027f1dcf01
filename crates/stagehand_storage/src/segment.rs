//! Columnar segment model.
//!
//! A [`Segment`] is the physical payload stored under an [`crate::AtomKey`]:
//! an index (explicit timestamps, or an implicit run of row numbers) plus
//! named typed columns of equal length. Stores only need its
//! [`SegmentHeader`]; everything else is carried through untouched.

use crate::key::IndexValue;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Typed values of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    /// 64-bit signed integers.
    Int64(Vec<i64>),
    /// 64-bit floats.
    Float64(Vec<f64>),
    /// Booleans.
    Bool(Vec<bool>),
    /// UTF-8 strings.
    Utf8(Vec<String>),
}

impl ColumnData {
    /// Number of values in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Utf8(v) => v.len(),
        }
    }

    /// Returns true if the column has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the value type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int64(_) => "int64",
            Self::Float64(_) => "float64",
            Self::Bool(_) => "bool",
            Self::Utf8(_) => "utf8",
        }
    }

    /// Copies the given rows into a new column.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is out of bounds.
    #[must_use]
    pub fn slice(&self, rows: Range<usize>) -> Self {
        match self {
            Self::Int64(v) => Self::Int64(v[rows].to_vec()),
            Self::Float64(v) => Self::Float64(v[rows].to_vec()),
            Self::Bool(v) => Self::Bool(v[rows].to_vec()),
            Self::Utf8(v) => Self::Utf8(v[rows].to_vec()),
        }
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column values.
    pub data: ColumnData,
}

impl Column {
    /// Creates a column.
    #[must_use]
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Index of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentIndex {
    /// One timestamp (nanoseconds) per row.
    Timestamp(Vec<IndexValue>),
    /// Rows numbered `start_row..start_row + rows`.
    RowCount {
        /// Row number of the first row.
        start_row: IndexValue,
        /// Number of rows.
        rows: u64,
    },
}

impl SegmentIndex {
    /// Number of rows described by the index.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Timestamp(ts) => ts.len() as u64,
            Self::RowCount { rows, .. } => *rows,
        }
    }

    /// Returns true if the index describes no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Half-open range `[start, end)` of index values covered, or `None` when empty.
    ///
    /// Timestamps need not be sorted; the bounds are `[min, max + 1)`. An end
    /// past `IndexValue::MAX` saturates.
    #[must_use]
    pub fn bounds(&self) -> Option<(IndexValue, IndexValue)> {
        match self {
            Self::Timestamp(ts) => {
                let min = *ts.iter().min()?;
                let max = *ts.iter().max()?;
                Some((min, max.saturating_add(1)))
            }
            Self::RowCount { rows: 0, .. } => None,
            Self::RowCount { start_row, rows } => {
                let rows = IndexValue::try_from(*rows).unwrap_or(IndexValue::MAX);
                Some((*start_row, start_row.saturating_add(rows)))
            }
        }
    }

    /// Copies the given rows into a new index.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is out of bounds for a timestamp index.
    #[must_use]
    pub fn slice(&self, rows: Range<usize>) -> Self {
        match self {
            Self::Timestamp(ts) => Self::Timestamp(ts[rows].to_vec()),
            Self::RowCount { start_row, .. } => Self::RowCount {
                start_row: start_row.saturating_add(rows.start as IndexValue),
                rows: rows.len() as u64,
            },
        }
    }
}

/// Summary of a segment that can be read without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentHeader {
    /// Number of rows.
    pub row_count: u64,
    /// Half-open index range covered, or `None` for an empty segment.
    pub index_bounds: Option<(IndexValue, IndexValue)>,
    /// Column names, in order.
    pub column_names: Vec<String>,
}

/// The physical payload stored under a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    index: SegmentIndex,
    columns: Vec<Column>,
}

impl Segment {
    /// Creates a segment.
    ///
    /// No consistency checks are made here; callers that build segments from
    /// untrusted input validate them before staging.
    #[must_use]
    pub fn new(index: SegmentIndex, columns: Vec<Column>) -> Self {
        Self { index, columns }
    }

    /// Returns the index.
    #[must_use]
    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    /// Returns the columns.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.index.len()
    }

    /// Half-open index range covered.
    #[must_use]
    pub fn index_bounds(&self) -> Option<(IndexValue, IndexValue)> {
        self.index.bounds()
    }

    /// Returns the payload-free summary of this segment.
    #[must_use]
    pub fn header(&self) -> SegmentHeader {
        SegmentHeader {
            row_count: self.row_count(),
            index_bounds: self.index_bounds(),
            column_names: self.columns.iter().map(|c| c.name.clone()).collect(),
        }
    }

    /// Copies the given rows of the index and every column into a new segment.
    ///
    /// # Panics
    ///
    /// Panics if `rows` is out of bounds for any column.
    #[must_use]
    pub fn slice(&self, rows: Range<usize>) -> Self {
        Self {
            index: self.index.slice(rows.clone()),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.slice(rows.clone())))
                .collect(),
        }
    }

    /// Consumes the segment, returning its parts.
    #[must_use]
    pub fn into_parts(self) -> (SegmentIndex, Vec<Column>) {
        (self.index, self.columns)
    }
}
