//! Measurement store access.
//!
//! The engine reads three logical tables: `batches` (one row per
//! measurement run), `hosts` (landmark positions), and `measurements`
//! (per-destination RTTs). [`RowSource`] abstracts them so the pipeline
//! can run against a live Postgres database ([`PgStore`]) or an in-memory
//! fixture in tests.

mod postgres;
mod types;

pub use postgres::PgStore;
pub use types::{BatchMetadata, DbError, MeasurementRow};

use async_trait::async_trait;

use crate::landmarks::LandmarkTable;

/// A provider of measurement rows.
///
/// One instance is shared by the coordinator and all workers; Postgres
/// backs it with a connection pool sized to one connection per worker
/// plus one for the coordinator.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Ids of all batches to process. `selector` is an optional SQL
    /// fragment appended verbatim to the selection query.
    async fn batch_ids(&self, selector: Option<&str>) -> Result<Vec<i64>, DbError>;

    /// Metadata for one batch.
    async fn batch_metadata(&self, id: i64) -> Result<BatchMetadata, DbError>;

    /// All measurement rows of one batch. Malformed rows are skipped
    /// with a warning rather than failing the batch.
    async fn measurements(&self, id: i64) -> Result<Vec<MeasurementRow>, DbError>;

    /// The full landmark table. Loaded once by the coordinator.
    async fn landmarks(&self) -> Result<LandmarkTable, DbError>;
}
