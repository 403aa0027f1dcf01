//! Property-based test generators using proptest.
//!
//! Provides strategies for streams, frames and staged layouts that keep the
//! invariants the staging layer expects.

use proptest::prelude::*;
use stagehand_core::InputFrame;
use stagehand_storage::{ColumnData, StreamId};

/// Strategy for generating stream ids of either flavour, including string
/// ids containing key separators.
pub fn stream_id_strategy() -> impl Strategy<Value = StreamId> {
    prop_oneof![
        any::<u64>().prop_map(StreamId::Num),
        prop::string::string_regex("[a-zA-Z0-9_./ -]{1,24}")
            .expect("Invalid regex")
            .prop_map(StreamId::Str),
    ]
}

/// Strategy for generating non-decreasing timestamp indexes.
pub fn sorted_timestamps_strategy(max_rows: usize) -> impl Strategy<Value = Vec<i64>> {
    (
        -1_000_000i64..1_000_000,
        prop::collection::vec(0i64..1_000, 0..=max_rows),
    )
        .prop_map(|(start, steps)| {
            steps
                .into_iter()
                .scan(start, |ts, step| {
                    *ts += step;
                    Some(*ts)
                })
                .collect()
        })
}

/// Strategy for generating timestamp indexes that decrease somewhere.
pub fn unsorted_timestamps_strategy(max_rows: usize) -> impl Strategy<Value = Vec<i64>> {
    sorted_timestamps_strategy(max_rows.max(2))
        .prop_filter("need two distinct timestamps", |ts| ts.first() != ts.last())
        .prop_map(|mut ts| {
            ts.reverse();
            ts
        })
}

/// Strategy for generating well-formed timestamp indexed frames with an
/// `Int64` and a `Utf8` column.
pub fn frame_strategy(max_rows: usize) -> impl Strategy<Value = InputFrame> {
    sorted_timestamps_strategy(max_rows).prop_map(|ts| {
        let rows = ts.len() as i64;
        InputFrame::timestamp_indexed(ts)
            .with_column("qty", ColumnData::Int64((0..rows).collect()))
            .with_column(
                "tag",
                ColumnData::Utf8((0..rows).map(|i| format!("r{i}")).collect()),
            )
    })
}

/// Strategy for generating contiguous, non-overlapping `[start, end)`
/// index ranges in a random write order.
///
/// Returns `(ranges_in_write_order, ranges_sorted)`.
pub fn shuffled_ranges_strategy(
    max_ranges: usize,
) -> impl Strategy<Value = (Vec<(i64, i64)>, Vec<(i64, i64)>)> {
    prop::collection::vec(1i64..50, 1..=max_ranges)
        .prop_flat_map(|lengths| {
            let sorted: Vec<(i64, i64)> = lengths
                .iter()
                .scan(0i64, |start, len| {
                    let range = (*start, *start + len);
                    *start += len;
                    Some(range)
                })
                .collect();
            (Just(sorted.clone()).prop_shuffle(), Just(sorted))
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropertyTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum rows per generated frame.
    pub max_rows: usize,
}

impl Default for PropertyTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_rows: 200,
        }
    }
}

impl PropertyTestConfig {
    /// Returns the proptest runner configuration.
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig::with_cases(self.cases)
    }
}
