//! Range models: calibrated RTT-to-distance conversion.
//!
//! A range model converts a series of round-trip times to a plausible
//! band of distances over the surface of the Earth. All models consider
//! the smallest RTT first, because it is the one least influenced by
//! delays not due to the true distance.

use serde::{Deserialize, Serialize};

/// Meters of one-way distance per millisecond of round-trip time at the
/// physical propagation limit. Signals in cable propagate at roughly
/// 2/3 c; the division by two converts RTT to one-way travel time.
pub const PHYSICAL_M_PER_RTT_MS: f64 = 299_792_458.0 * (2.0 / 3.0) / 2.0 / 1_000.0;

/// z-score of the 5th/95th percentile of a Gaussian.
const GAUSSIAN_TAIL_Z: f64 = 1.644_853_6;

/// A plausible distance band in meters. `min_m` may be 0; `max_m` may be
/// infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceRange {
    pub min_m: f64,
    pub max_m: f64,
}

/// A calibrated RTT-to-distance model for one landmark (or pooled over
/// all landmarks).
///
/// Slopes `m` are in meters per millisecond of RTT; intercepts `b` and
/// spreads are in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum RangeModel {
    /// Constraint-Based Geolocation bestline: an upper bound only.
    Cbg { m: f64, b: f64 },
    /// Octant-style bound; same shape as CBG at ranging time.
    Octant { m: f64, b: f64 },
    /// Spotter with a uniform prior: an upper bound only.
    SpotterUniform { m: f64, b: f64 },
    /// Spotter with a Gaussian prior: a two-sided band at the 5th and
    /// 95th percentiles of the modeled distance distribution.
    SpotterGaussian { m: f64, b: f64, spread: f64 },
}

impl RangeModel {
    /// Distance band for a sorted, ascending series of RTTs in
    /// milliseconds. The series must be non-empty.
    pub fn range(&self, rtts: &[f32]) -> DistanceRange {
        debug_assert!(!rtts.is_empty(), "range() requires at least one RTT");
        if rtts.is_empty() {
            return DistanceRange {
                min_m: 0.0,
                max_m: 0.0,
            };
        }
        let min_rtt = rtts[0] as f64;
        match *self {
            RangeModel::Cbg { m, b }
            | RangeModel::Octant { m, b }
            | RangeModel::SpotterUniform { m, b } => DistanceRange {
                min_m: 0.0,
                max_m: (m * min_rtt + b).max(0.0),
            },
            RangeModel::SpotterGaussian { m, b, spread } => {
                let mean_rtt = rtts.iter().map(|&r| r as f64).sum::<f64>() / rtts.len() as f64;
                let mu = m * mean_rtt + b;
                DistanceRange {
                    min_m: (mu - GAUSSIAN_TAIL_Z * spread).max(0.0),
                    max_m: (mu + GAUSSIAN_TAIL_Z * spread).max(0.0),
                }
            }
        }
    }
}

/// Distance band permitted by the speed of light in cable, for a minimum
/// observed RTT in milliseconds.
pub fn physical_range(min_rtt_ms: f64) -> DistanceRange {
    DistanceRange {
        min_m: 0.0,
        max_m: PHYSICAL_M_PER_RTT_MS * min_rtt_ms.max(0.0),
    }
}
