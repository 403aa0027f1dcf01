//! Caller-supplied frames to be staged.

use crate::error::{CoreError, CoreResult};
use stagehand_storage::{Column, ColumnData, IndexValue, Segment, SegmentIndex};
use std::collections::HashSet;
use std::ops::Range;

/// A logical block of rows handed to the writer.
///
/// A frame is an index plus named columns. The writer validates it, cuts it
/// into row slices and stages each slice as a segment.
///
/// # Example
///
/// ```rust
/// use stagehand_core::InputFrame;
/// use stagehand_storage::ColumnData;
///
/// let frame = InputFrame::timestamp_indexed(vec![100, 200, 300])
///     .with_column("px", ColumnData::Float64(vec![1.0, 1.1, 1.2]));
/// assert_eq!(frame.num_rows(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InputFrame {
    index: SegmentIndex,
    columns: Vec<Column>,
}

impl InputFrame {
    /// Creates a frame indexed by one timestamp per row.
    #[must_use]
    pub fn timestamp_indexed(timestamps: Vec<IndexValue>) -> Self {
        Self {
            index: SegmentIndex::Timestamp(timestamps),
            columns: Vec::new(),
        }
    }

    /// Creates a frame of `rows` rows numbered from `start_row`.
    #[must_use]
    pub fn row_count_indexed(start_row: IndexValue, rows: u64) -> Self {
        Self {
            index: SegmentIndex::RowCount { start_row, rows },
            columns: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.columns.push(Column::new(name, data));
        self
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

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        usize::try_from(self.index.len()).unwrap_or(usize::MAX)
    }

    /// Returns true if the frame has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Checks that every column matches the index length, that column
    /// names are unique and that the index range end fits in an
    /// [`IndexValue`].
    pub fn validate_structure(&self) -> CoreResult<()> {
        validate_index_range(&self.index)?;
        validate_columns(self.index.len(), &self.columns)
    }

    /// Checks that the index never decreases.
    ///
    /// Equal consecutive timestamps are allowed. Row-count indexes are
    /// monotonic by construction.
    pub fn check_index_monotonic(&self) -> CoreResult<()> {
        let SegmentIndex::Timestamp(ts) = &self.index else {
            return Ok(());
        };

        match ts.windows(2).position(|w| w[1] < w[0]) {
            Some(i) => Err(CoreError::InvalidIndex {
                position: i + 1,
                previous: ts[i],
                current: ts[i + 1],
            }),
            None => Ok(()),
        }
    }

    /// Returns the row ranges of consecutive slices of at most `rows_per_slice` rows.
    #[must_use]
    pub fn slice_ranges(&self, rows_per_slice: usize) -> Vec<Range<usize>> {
        let rows = self.num_rows();
        let step = rows_per_slice.max(1);
        (0..rows)
            .step_by(step)
            .map(|start| start..(start + step).min(rows))
            .collect()
    }

    /// Copies the given rows into a segment.
    #[must_use]
    pub fn slice_to_segment(&self, rows: Range<usize>) -> Segment {
        Segment::new(
            self.index.slice(rows.clone()),
            self.columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.slice(rows.clone())))
                .collect(),
        )
    }

    /// Converts the whole frame into a single segment.
    #[must_use]
    pub fn into_segment(self) -> Segment {
        Segment::new(self.index, self.columns)
    }
}

/// Checks that the exclusive end of the index range is representable.
///
/// Timestamps must be below `IndexValue::MAX` and a row-count index must end
/// at or before it.
pub(crate) fn validate_index_range(index: &SegmentIndex) -> CoreResult<()> {
    match index {
        SegmentIndex::Timestamp(ts) => match ts.iter().position(|&t| t == IndexValue::MAX) {
            Some(position) => Err(CoreError::invalid_frame(format!(
                "timestamp at row {position} is IndexValue::MAX"
            ))),
            None => Ok(()),
        },
        SegmentIndex::RowCount { start_row, rows } => IndexValue::try_from(*rows)
            .ok()
            .and_then(|rows| start_row.checked_add(rows))
            .map(|_| ())
            .ok_or_else(|| {
                CoreError::invalid_frame(format!(
                    "{rows} rows from row {start_row} overflow the index"
                ))
            }),
    }
}

/// Checks that every column has `rows` rows and that column names are unique.
pub(crate) fn validate_columns(rows: u64, columns: &[Column]) -> CoreResult<()> {
    let mut names = HashSet::with_capacity(columns.len());

    for column in columns {
        if column.data.len() as u64 != rows {
            return Err(CoreError::invalid_frame(format!(
                "column {:?} has {} rows, index has {rows}",
                column.name,
                column.data.len()
            )));
        }
        if !names.insert(column.name.as_str()) {
            return Err(CoreError::invalid_frame(format!(
                "duplicate column {:?}",
                column.name
            )));
        }
    }
    Ok(())
}

impl From<Segment> for InputFrame {
    fn from(segment: Segment) -> Self {
        let (index, columns) = segment.into_parts();
        Self { index, columns }
    }
}
