//! Read-time filters over staged segments.
//!
//! ## Intersection Rule
//!
//! A segment covering the half-open index range `[s, e)` is selected when at
//! least one index value `v` with `s <= v < e` satisfies the requested bounds.
//! Overlap is enough; containment is not required. For the lower bound,
//! `Included(a)` needs `e > a` and `Excluded(a)` needs `e > a + 1`. For the
//! upper bound, `Included(b)` needs `s <= b` and `Excluded(b)` needs `s < b`.
//!
//! Row ranges are half-open `[start, end)` over absolute row numbers and
//! select a segment when its row range overlaps.

use stagehand_storage::IndexValue;
use std::ops::{Bound, Range, RangeBounds};

/// Bounds over the logical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    /// Lower bound.
    pub start: Bound<IndexValue>,
    /// Upper bound.
    pub end: Bound<IndexValue>,
}

impl IndexRange {
    /// Creates an index range from any range expression, e.g. `5..25` or `..=10`.
    #[must_use]
    pub fn new(range: impl RangeBounds<IndexValue>) -> Self {
        Self {
            start: range.start_bound().cloned(),
            end: range.end_bound().cloned(),
        }
    }

    /// Returns true if a segment covering `[start, end)` intersects this range.
    #[must_use]
    pub fn intersects(&self, start: IndexValue, end: IndexValue) -> bool {
        if start >= end {
            return false;
        }

        let lower_ok = match self.start {
            Bound::Included(a) => end > a,
            Bound::Excluded(a) => a.checked_add(1).is_some_and(|a1| end > a1),
            Bound::Unbounded => true,
        };
        let upper_ok = match self.end {
            Bound::Included(b) => start <= b,
            Bound::Excluded(b) => start < b,
            Bound::Unbounded => true,
        };
        lower_ok && upper_ok
    }
}

impl RangeBounds<IndexValue> for IndexRange {
    fn start_bound(&self) -> Bound<&IndexValue> {
        self.start.as_ref()
    }

    fn end_bound(&self) -> Bound<&IndexValue> {
        self.end.as_ref()
    }
}

/// Half-open range of absolute row numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    /// First row (inclusive).
    pub start: u64,
    /// End row (exclusive).
    pub end: u64,
}

impl RowRange {
    /// Creates a row range.
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of rows in the range.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the range holds no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the two ranges share at least one row.
    #[must_use]
    pub const fn intersects(&self, other: &RowRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

impl From<Range<u64>> for RowRange {
    fn from(range: Range<u64>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// Filter applied when retrieving staged segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterRange {
    /// Keep everything.
    #[default]
    Unconstrained,
    /// Keep segments whose index range intersects the bounds.
    Index(IndexRange),
    /// Keep segments whose absolute row range intersects the bounds.
    Rows(RowRange),
}

impl FilterRange {
    /// Index filter from a range expression.
    #[must_use]
    pub fn index(range: impl RangeBounds<IndexValue>) -> Self {
        Self::Index(IndexRange::new(range))
    }

    /// Row filter over `[start, end)`.
    #[must_use]
    pub const fn rows(start: u64, end: u64) -> Self {
        Self::Rows(RowRange::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bound() -> impl Strategy<Value = Bound<IndexValue>> {
        prop_oneof![
            (-20i64..20).prop_map(Bound::Included),
            (-20i64..20).prop_map(Bound::Excluded),
            Just(Bound::Unbounded),
        ]
    }

    #[test]
    fn half_open_request_intersects_overlapping_segments() {
        let range = IndexRange::new(5..25);
        assert!(range.intersects(0, 10));
        assert!(range.intersects(10, 20));
        assert!(range.intersects(20, 30));
        assert!(!range.intersects(25, 35));
        assert!(!range.intersects(-10, 5));
    }

    #[test]
    fn inclusive_bounds() {
        let range = IndexRange::new(5..=20);
        assert!(range.intersects(20, 30));
        assert!(range.intersects(0, 6));
        assert!(!range.intersects(0, 5));
        assert!(!range.intersects(21, 30));
    }

    #[test]
    fn excluded_lower_bound() {
        let range = IndexRange {
            start: Bound::Excluded(9),
            end: Bound::Unbounded,
        };
        assert!(!range.intersects(0, 10));
        assert!(range.intersects(0, 11));
        assert!(range.intersects(100, 200));
    }

    #[test]
    fn excluded_lower_bound_at_max_matches_nothing() {
        let range = IndexRange {
            start: Bound::Excluded(IndexValue::MAX),
            end: Bound::Unbounded,
        };
        assert!(!range.intersects(0, IndexValue::MAX));
    }

    #[test]
    fn unbounded_matches_everything_nonempty() {
        let range = IndexRange::new(..);
        assert!(range.intersects(IndexValue::MIN, IndexValue::MAX));
        assert!(!range.intersects(5, 5));
    }

    #[test]
    fn row_range_intersection() {
        let request = RowRange::new(10, 20);
        assert!(request.intersects(&RowRange::new(0, 11)));
        assert!(request.intersects(&RowRange::new(19, 40)));
        assert!(!request.intersects(&RowRange::new(0, 10)));
        assert!(!request.intersects(&RowRange::new(20, 30)));
        assert!(!RowRange::new(5, 5).intersects(&RowRange::new(0, 10)));
    }

    #[test]
    fn default_is_unconstrained() {
        assert_eq!(FilterRange::default(), FilterRange::Unconstrained);
        assert_eq!(
            FilterRange::index(..10),
            FilterRange::Index(IndexRange {
                start: Bound::Unbounded,
                end: Bound::Excluded(10)
            })
        );
    }

    proptest! {
        #[test]
        fn intersects_iff_some_value_matches(
            start in bound(),
            end in bound(),
            s in -25i64..25,
            len in 0i64..10,
        ) {
            let range = IndexRange { start, end };
            let e = s + len;
            let brute = (s..e).any(|v| range.contains(&v));
            prop_assert_eq!(range.intersects(s, e), brute);
        }
    }
}
