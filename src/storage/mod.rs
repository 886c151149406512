// src/storage/mod.rs
pub mod aggregate;
pub mod influx;

use crate::error::{PersistenceError, QueryError};

pub use aggregate::{
    aggregate, aggregate_with, AggregatedInterval, AggregationResult, MergePolicy, TimeSeriesRow,
    DUPLICATE_ROW_POLICY,
};
pub use influx::InfluxDataStore;

/// Write side: receives the score of every anomalous message.
#[async_trait::async_trait]
pub trait ScoreSink: Send + Sync {
    async fn save(&self, score: f64) -> Result<(), PersistenceError>;
}

/// Read side on top of a sink: per-interval class counts.
///
/// `since` and `group_by` are duration literals (`1d`, `15m`, ...); `None`
/// selects the store's configured default.
#[async_trait::async_trait]
pub trait DataStore: ScoreSink {
    async fn read(
        &self,
        since: Option<&str>,
        group_by: Option<&str>,
    ) -> Result<AggregationResult, QueryError>;
}
