//! Per-batch measurement preprocessing.
//!
//! Raw measurement rows are filtered (probe status, self-pings, RTT
//! range), the proxy's RTT overhead is estimated and subtracted when the
//! batch was measured through a proxy, and the result is a clean
//! `{landmark → sorted RTTs}` map plus diagnostic annotations on the
//! batch metadata.
//!
//! # Proxy overhead estimation
//!
//! Three methods, in decreasing order of accuracy:
//!
//! 1. *Router*: a measurement to the `.1` host of the proxy's /24 network
//!    pins down the last-hop overhead: `min(rtt) − 5 ms`.
//! 2. *There-and-back*: otherwise, the smallest min-RTT among landmarks
//!    colocated with the client approximates a full proxy round trip:
//!    `min/2 − 5 ms`.
//! 3. *Clamp*: the adjustment can never exceed `min over all destinations
//!    of min(rtts) − 5 ms`; estimates above it are clamped (and the
//!    unclamped value recorded), and with no prior method the clamp value
//!    itself is the estimate.


use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::db::{BatchMetadata, MeasurementRow};
use crate::landmarks::LandmarkTable;

/// Probe status for a completed handshake.
pub const STATUS_SUCCESS: i32 = 0;
/// Probe status for ECONNREFUSED; the RST still carries timing.
pub const STATUS_CONN_REFUSED: i32 = 111;

/// RTTs at or above this are dropped as meaningless.
pub const MAX_RTT_MS: f32 = 5_000.0;
/// Post-subtraction RTTs are floored here.
pub const RTT_FLOOR_MS: f32 = 0.1;
/// Margin subtracted from a reference RTT when estimating proxy overhead.
pub const PROXY_MARGIN_MS: f32 = 5.0;
/// A landmark within this many degrees of the client on both axes is
/// considered colocated with it.
pub const COLOCATED_DEGREES: f64 = 0.01;

/// A preprocessed batch: annotated metadata plus per-landmark ascending
/// RTT series. Owned exclusively by one worker.
#[derive(Debug, Clone)]
pub struct PreprocessedBatch {
    pub metadata: BatchMetadata,
    pub series: BTreeMap<Ipv4Addr, Vec<f32>>,
}

/// Filter raw rows, estimate and subtract proxy overhead, and sort each
/// series ascending.
pub fn preprocess_batch(
    mut metadata: BatchMetadata,
    rows: Vec<MeasurementRow>,
    landmarks: &LandmarkTable,
) -> PreprocessedBatch {
    let mut series: BTreeMap<Ipv4Addr, Vec<f32>> = BTreeMap::new();
    let loopback = Ipv4Addr::new(127, 0, 0, 1);

    for row in rows {
        if row.status != STATUS_SUCCESS && row.status != STATUS_CONN_REFUSED {
            continue;
        }
        if row.rtt_ms == 0.0 {
            continue;
        }
        if row.dst == loopback
            || Some(row.dst) == metadata.client_addr
            || Some(row.dst) == metadata.proxy_addr
        {
            continue;
        }
        if !row.rtt_ms.is_finite() || row.rtt_ms < 0.0 || row.rtt_ms >= MAX_RTT_MS {
            warn!(
                batch = metadata.id,
                dst = %row.dst,
                rtt_ms = row.rtt_ms,
                "dropping out-of-range RTT sample"
            );
            continue;
        }
        series.entry(row.dst).or_default().push(row.rtt_ms);
    }

    let adjustment = if metadata.proxied {
        estimate_proxy_overhead(&mut metadata, &series, landmarks)
    } else {
        0.0
    };

    for rtts in series.values_mut() {
        for rtt in rtts.iter_mut() {
            *rtt = (*rtt - adjustment).max(RTT_FLOOR_MS);
        }
        rtts.sort_by(|a, b| a.total_cmp(b));
    }

    PreprocessedBatch { metadata, series }
}

fn series_min(rtts: &[f32]) -> f32 {
    rtts.iter().copied().fold(f32::INFINITY, f32::min)
}

/// Estimate the proxy RTT overhead and record the estimation method and
/// diagnostics into the batch annotations. Returns the adjustment in
/// milliseconds, already clamped and floored at zero.
fn estimate_proxy_overhead(
    metadata: &mut BatchMetadata,
    series: &BTreeMap<Ipv4Addr, Vec<f32>>,
    landmarks: &LandmarkTable,
) -> f32 {
    let mut estimate: Option<(f32, String, Ipv4Addr)> = None;

    // Router method: the .1 host of the proxy's /24 network.
    if let Some(proxy) = metadata.proxy_addr {
        let octets = proxy.octets();
        let router = Ipv4Addr::new(octets[0], octets[1], octets[2], 1);
        if let Some(rtts) = series.get(&router) {
            estimate = Some((
                series_min(rtts) - PROXY_MARGIN_MS,
                "router".to_string(),
                router,
            ));
        }
    }

    // There-and-back method: the nearest colocated landmark's RTT is one
    // proxy round trip plus one (negligible) local hop.
    if estimate.is_none() {
        let colocated = series
            .iter()
            .filter(|(addr, _)| {
                landmarks.get(addr).is_some_and(|lm| {
                    (lm.lat - metadata.client_lat).abs() < COLOCATED_DEGREES
                        && (lm.lon - metadata.client_lon).abs() < COLOCATED_DEGREES
                })
            })
            .map(|(addr, rtts)| (*addr, series_min(rtts)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((addr, min_rtt)) = colocated {
            estimate = Some((
                min_rtt / 2.0 - PROXY_MARGIN_MS,
                "there_and_back".to_string(),
                addr,
            ));
        }
    }

    // Clamp: no destination's series may drop below the margin.
    let clamp = series
        .values()
        .map(|rtts| series_min(rtts))
        .fold(f32::INFINITY, f32::min)
        - PROXY_MARGIN_MS;

    let (mut adjustment, mut method) = match estimate {
        Some((value, method, source)) => {
            metadata.annotate("proxy_rtt_estimation_source", source.to_string());
            (value, method)
        }
        None => (clamp, "clamp".to_string()),
    };

    if adjustment > clamp {
        metadata.annotate("proxy_rtt_estimation_unclamped", adjustment as f64);
        adjustment = clamp;
        method = format!("{method}_clamped");
    }
    adjustment = adjustment.max(0.0);
    if !adjustment.is_finite() {
        // No usable series at all.
        adjustment = 0.0;
    }

    debug!(
        batch = metadata.id,
        adjustment_ms = adjustment,
        method = %method,
        "estimated proxy RTT overhead"
    );
    metadata.annotate("estimated_proxy_rtt", adjustment as f64);
    metadata.annotate("proxy_rtt_estimation_method", method);
    adjustment
}
