//! Folds flat bucketed-query rows into a per-interval, per-class summary.
//!
//! The store hands back rows of `(interval, class, count)`; the chart wants
//! `{interval: {class: count}}`. Rows are consumed once, in the order the
//! store returned them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One row of a time-bucketed count query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    /// Bucket start, unix milliseconds.
    pub interval_ms: i64,
    pub class: String,
    pub count: u64,
}

impl TimeSeriesRow {
    pub fn new(interval_ms: i64, class: impl Into<String>, count: u64) -> Self {
        Self {
            interval_ms,
            class: class.into(),
            count,
        }
    }
}

/// Class value -> count within a single interval.
pub type AggregatedInterval = BTreeMap<String, u64>;

/// Interval start (unix ms) -> per-class counts.
pub type AggregationResult = BTreeMap<i64, AggregatedInterval>;

/// How to merge two rows that share both interval and class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Counts are added. Independent of row order.
    Sum,
    /// The row seen last replaces earlier ones.
    LastWriteWins,
}

/// Policy used by [`aggregate`]. Summation gives the same result for every
/// ordering of duplicate rows, which the store does not guarantee.
pub const DUPLICATE_ROW_POLICY: MergePolicy = MergePolicy::Sum;

pub fn aggregate<I>(rows: I) -> AggregationResult
where
    I: IntoIterator<Item = TimeSeriesRow>,
{
    aggregate_with(rows, DUPLICATE_ROW_POLICY)
}

pub fn aggregate_with<I>(rows: I, policy: MergePolicy) -> AggregationResult
where
    I: IntoIterator<Item = TimeSeriesRow>,
{
    rows.into_iter().fold(AggregationResult::new(), |mut acc, row| {
        let counts = acc
            .entry(row.interval_ms)
            .or_default()
            .entry(row.class)
            .or_insert(0);
        *counts = match policy {
            MergePolicy::Sum => counts.saturating_add(row.count),
            MergePolicy::LastWriteWins => row.count,
        };
        acc
    })
}
