//! Database-facing entity types.

use std::net::Ipv4Addr;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from the measurement store.
///
/// Connection and query failures are fatal at startup; during a run a
/// failing batch is retried once and then skipped.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("cannot connect to database: {source}")]
    Connect {
        #[source]
        source: sqlx::Error,
    },

    #[error("query failed ({context}): {source}")]
    Query {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// One raw measurement row: destination, RTT, and the probe's errno.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRow {
    pub dst: Ipv4Addr,
    pub rtt_ms: f32,
    /// errno from the probe; 0 = success, 111 = ECONNREFUSED.
    pub status: i32,
}

/// Metadata for one measurement batch.
///
/// Loaded from the `batches` table and augmented during preprocessing
/// with proxy-RTT-estimation diagnostics, and at output time with the
/// region-on-land flag. The free-form annotation map is flattened into
/// the output file's properties.
#[derive(Debug, Clone, Serialize)]
pub struct BatchMetadata {
    pub id: i64,
    pub client_lon: f64,
    pub client_lat: f64,
    pub client_addr: Option<Ipv4Addr>,
    pub proxied: bool,
    pub proxy_lon: Option<f64>,
    pub proxy_lat: Option<f64>,
    pub proxy_addr: Option<Ipv4Addr>,
    #[serde(flatten)]
    pub annotations: Map<String, Value>,
}

impl BatchMetadata {
    /// Record a diagnostic annotation, replacing any previous value.
    pub fn annotate(&mut self, key: &str, value: impl Into<Value>) {
        self.annotations.insert(key.to_string(), value.into());
    }

    /// Read an annotation back (mostly for tests and reporting).
    pub fn annotation(&self, key: &str) -> Option<&Value> {
        self.annotations.get(key)
    }
}
