//! Postgres-backed row source.
//!
//! Wire conventions: addresses are selected as text and parsed here (a
//! malformed address is a per-row warning, not a batch failure), RTTs are
//! double precision, `annot` is a JSON object. Latitudes outside
//! [−90, 90] and poles are dropped per row; longitudes are wrapped.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::warn;

use super::types::{BatchMetadata, DbError, MeasurementRow};
use super::RowSource;
use crate::landmarks::{wrap_longitude, LandmarkPosition, LandmarkTable};

/// A pooled Postgres connection source.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `dsn` with a pool of `max_connections` connections
    /// (one per worker plus one for the coordinator).
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(dsn)
            .await
            .map_err(|source| DbError::Connect { source })?;
        Ok(Self { pool })
    }
}

fn parse_addr(raw: Option<String>, what: &'static str, batch: i64) -> Option<Ipv4Addr> {
    let raw = raw?;
    // Postgres inet values may carry a netmask suffix.
    let bare = raw.split('/').next().unwrap_or(&raw);
    match bare.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            warn!(batch, value = %raw, "skipping malformed {what} address");
            None
        }
    }
}

#[async_trait]
impl RowSource for PgStore {
    async fn batch_ids(&self, selector: Option<&str>) -> Result<Vec<i64>, DbError> {
        let mut sql = "SELECT id FROM batches".to_string();
        if let Some(predicate) = selector {
            sql.push(' ');
            sql.push_str(predicate);
        }
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| DbError::Query {
                context: "batch ids",
                source,
            })?;
        rows.iter()
            .map(|row| {
                row.try_get::<i64, _>("id").map_err(|source| DbError::Query {
                    context: "batch ids",
                    source,
                })
            })
            .collect()
    }

    async fn batch_metadata(&self, id: i64) -> Result<BatchMetadata, DbError> {
        let row = sqlx::query(
            "SELECT client_lat, client_lon, client_addr::text AS client_addr, proxied, \
             proxy_lat, proxy_lon, proxy_addr::text AS proxy_addr, annot \
             FROM batches WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|source| DbError::Query {
            context: "batch metadata",
            source,
        })?;

        let decode = |source| DbError::Query {
            context: "batch metadata",
            source,
        };
        let annot: Option<Value> = row.try_get("annot").map_err(decode)?;
        let annotations = match annot {
            Some(Value::Object(map)) => map,
            Some(other) => {
                warn!(batch = id, "batch annot is not a JSON object: {other}");
                Default::default()
            }
            None => Default::default(),
        };

        Ok(BatchMetadata {
            id,
            client_lat: row.try_get("client_lat").map_err(decode)?,
            client_lon: wrap_longitude(row.try_get("client_lon").map_err(decode)?),
            client_addr: parse_addr(row.try_get("client_addr").map_err(decode)?, "client", id),
            proxied: row.try_get("proxied").map_err(decode)?,
            proxy_lat: row.try_get("proxy_lat").map_err(decode)?,
            proxy_lon: row
                .try_get::<Option<f64>, _>("proxy_lon")
                .map_err(decode)?
                .map(wrap_longitude),
            proxy_addr: parse_addr(row.try_get("proxy_addr").map_err(decode)?, "proxy", id),
            annotations,
        })
    }

    async fn measurements(&self, id: i64) -> Result<Vec<MeasurementRow>, DbError> {
        let mut stream = sqlx::query(
            "SELECT dst::text AS dst, rtt_ms, status FROM measurements WHERE batch = $1",
        )
        .bind(id)
        .fetch(&self.pool);

        let mut out = Vec::new();
        while let Some(row) = stream.try_next().await.map_err(|source| DbError::Query {
            context: "measurements",
            source,
        })? {
            if let Some(parsed) = decode_measurement(&row, id) {
                out.push(parsed);
            }
        }
        Ok(out)
    }

    async fn landmarks(&self) -> Result<LandmarkTable, DbError> {
        let mut stream = sqlx::query(
            "SELECT ipv4::text AS ipv4, label, longitude, latitude, country, asn FROM hosts",
        )
        .fetch(&self.pool);

        let mut table = LandmarkTable::new();
        while let Some(row) = stream.try_next().await.map_err(|source| DbError::Query {
            context: "hosts",
            source,
        })? {
            if let Some(landmark) = decode_landmark(&row) {
                table.insert(landmark);
            }
        }
        Ok(table)
    }
}

fn decode_measurement(row: &PgRow, batch: i64) -> Option<MeasurementRow> {
    let dst: Option<String> = row.try_get("dst").ok()?;
    let dst = parse_addr(dst, "measurement destination", batch)?;
    let rtt_ms: f64 = match row.try_get("rtt_ms") {
        Ok(v) => v,
        Err(error) => {
            warn!(batch, %dst, %error, "skipping measurement row with unreadable rtt");
            return None;
        }
    };
    let status: i32 = match row.try_get("status") {
        Ok(v) => v,
        Err(error) => {
            warn!(batch, %dst, %error, "skipping measurement row with unreadable status");
            return None;
        }
    };
    Some(MeasurementRow {
        dst,
        rtt_ms: rtt_ms as f32,
        status,
    })
}

fn decode_landmark(row: &PgRow) -> Option<LandmarkPosition> {
    let ipv4: Option<String> = row.try_get("ipv4").ok()?;
    let ipv4 = parse_addr(ipv4, "host", -1)?;
    let label: String = match row.try_get("label") {
        Ok(v) => v,
        Err(error) => {
            warn!(host = %ipv4, %error, "skipping host row with unreadable label");
            return None;
        }
    };
    let lon: f64 = row.try_get("longitude").ok()?;
    let lat: f64 = row.try_get("latitude").ok()?;
    if !lat.is_finite() || !lon.is_finite() || lat.abs() >= 90.0 {
        warn!(host = %ipv4, lat, lon, "skipping host with out-of-range position");
        return None;
    }
    let mut landmark = LandmarkPosition::new(ipv4, label, lon, lat);
    landmark.country = row.try_get("country").ok().flatten();
    landmark.asn = row.try_get("asn").ok().flatten();
    Some(landmark)
}
