//! Constraint-disk construction for one (batch, variant) pair.
//!
//! For every landmark that has usable RTTs, a known position, and a
//! calibration under the selected variant, two disks are built around the
//! landmark: the *empirical* disk (what the calibration claims) and the
//! *physical-limit* disk (what the speed of light in cable permits). The
//! two lists stay index-aligned; the solver relies on that pairing.

use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::calibration::{physical_range, CalibrationStore};
use crate::disk::{self, Disk};
use crate::landmarks::LandmarkTable;
use crate::preprocess::PreprocessedBatch;

/// Paired constraint disks for one (batch, variant), index-aligned.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    /// Landmark addresses, in the order of the disk lists.
    pub landmarks: Vec<Ipv4Addr>,
    /// Disks claimed by the calibration.
    pub empirical: Vec<Disk>,
    /// Disks permitted by the physical propagation limit.
    pub physical: Vec<Disk>,
    /// Landmarks skipped for lack of a position or calibration.
    pub skipped_uncalibrated: usize,
    /// Landmarks skipped because a disk failed to build.
    pub skipped_numeric: usize,
}

impl ConstraintSet {
    pub fn len(&self) -> usize {
        self.empirical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.empirical.is_empty()
    }
}

/// Build the paired empirical and physical-limit disks for `variant`.
///
/// Landmarks without a matching calibration are silently skipped but
/// counted; disks that fail to build are skipped with a warning (the
/// landmark contributes no constraint).
pub fn build_constraints(
    batch: &PreprocessedBatch,
    landmarks: &LandmarkTable,
    calibrations: &CalibrationStore,
    variant: &str,
) -> ConstraintSet {
    let mut set = ConstraintSet::default();

    for (addr, rtts) in &batch.series {
        if rtts.is_empty() {
            continue;
        }
        let Some(landmark) = landmarks.get(addr) else {
            set.skipped_uncalibrated += 1;
            continue;
        };
        let Some(model) = calibrations.lookup(variant, landmark) else {
            set.skipped_uncalibrated += 1;
            continue;
        };

        let min_rtt = rtts[0] as f64;
        let empirical_radius = model.range(rtts).max_m;
        let physical_radius = physical_range(min_rtt).max_m;

        let empirical = match disk::build(landmark.lon, landmark.lat, empirical_radius) {
            Ok(d) => d,
            Err(error) => {
                warn!(
                    batch = batch.metadata.id,
                    landmark = %addr,
                    variant,
                    %error,
                    "skipping landmark: empirical disk failed to build"
                );
                set.skipped_numeric += 1;
                continue;
            }
        };
        let physical = match disk::build(landmark.lon, landmark.lat, physical_radius) {
            Ok(d) => d,
            Err(error) => {
                warn!(
                    batch = batch.metadata.id,
                    landmark = %addr,
                    variant,
                    %error,
                    "skipping landmark: physical-limit disk failed to build"
                );
                set.skipped_numeric += 1;
                continue;
            }
        };

        set.landmarks.push(*addr);
        set.empirical.push(empirical);
        set.physical.push(physical);
    }

    debug!(
        batch = batch.metadata.id,
        variant,
        used = set.len(),
        skipped_uncalibrated = set.skipped_uncalibrated,
        skipped_numeric = set.skipped_numeric,
        "built constraint disks"
    );
    set
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::net::Ipv4Addr;

    use super::*;
    use crate::calibration::{RangeModel, VariantCalibration};
    use crate::db::BatchMetadata;
    use crate::landmarks::LandmarkPosition;

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 0, 2, last)
    }

    fn batch(series: &[(Ipv4Addr, Vec<f32>)]) -> PreprocessedBatch {
        PreprocessedBatch {
            metadata: BatchMetadata {
                id: 1,
                client_lon: 0.0,
                client_lat: 0.0,
                client_addr: None,
                proxied: false,
                proxy_lon: None,
                proxy_lat: None,
                proxy_addr: None,
                annotations: Default::default(),
            },
            series: series.iter().cloned().collect(),
        }
    }

    fn pooled_store(variant: &str, model: RangeModel) -> CalibrationStore {
        let mut variants = BTreeMap::new();
        variants.insert(
            variant.to_string(),
            VariantCalibration::Pooled { global: model },
        );
        CalibrationStore::from_variants(variants)
    }

    #[test]
    fn test_paired_lists_stay_aligned() {
        let landmarks: LandmarkTable = [
            LandmarkPosition::new(addr(1), "lm-1", -122.1, 37.4),
            LandmarkPosition::new(addr(2), "lm-2", 2.35, 48.85),
        ]
        .into_iter()
        .collect();
        let store = pooled_store(
            "cbg-m-1",
            RangeModel::Cbg {
                m: 90_000.0,
                b: 0.0,
            },
        );
        let batch = batch(&[(addr(1), vec![10.0, 20.0]), (addr(2), vec![5.0])]);

        let set = build_constraints(&batch, &landmarks, &store, "cbg-m-1");
        assert_eq!(set.len(), 2);
        assert_eq!(set.landmarks.len(), 2);
        assert_eq!(set.physical.len(), 2);
        assert_eq!(set.skipped_uncalibrated, 0);
        for (emp, phy) in set.empirical.iter().zip(set.physical.iter()) {
            assert_eq!((emp.lon(), emp.lat()), (phy.lon(), phy.lat()));
        }
    }

    #[test]
    fn test_empirical_disk_within_physical_disk() {
        // The calibrated claim must always be tighter than physics.
        let landmarks: LandmarkTable =
            [LandmarkPosition::new(addr(1), "lm-1", -122.1, 37.4)]
                .into_iter()
                .collect();
        let store = pooled_store(
            "cbg-m-1",
            RangeModel::Cbg {
                m: 90_000.0,
                b: 0.0,
            },
        );
        let batch = batch(&[(addr(1), vec![12.0])]);
        let set = build_constraints(&batch, &landmarks, &store, "cbg-m-1");
        let outside = set.empirical[0]
            .region()
            .difference(set.physical[0].region());
        assert!(outside.is_empty());
    }

    #[test]
    fn test_unknown_landmark_counted_as_skipped() {
        let landmarks: LandmarkTable =
            [LandmarkPosition::new(addr(1), "lm-1", -122.1, 37.4)]
                .into_iter()
                .collect();
        let store = pooled_store(
            "cbg-m-1",
            RangeModel::Cbg {
                m: 90_000.0,
                b: 0.0,
            },
        );
        let batch = batch(&[(addr(1), vec![10.0]), (addr(99), vec![10.0])]);
        let set = build_constraints(&batch, &landmarks, &store, "cbg-m-1");
        assert_eq!(set.len(), 1);
        assert_eq!(set.skipped_uncalibrated, 1);
    }

    #[test]
    fn test_missing_calibration_variant_skips_everything() {
        let landmarks: LandmarkTable =
            [LandmarkPosition::new(addr(1), "lm-1", -122.1, 37.4)]
                .into_iter()
                .collect();
        let store = pooled_store(
            "cbg-m-1",
            RangeModel::Cbg {
                m: 90_000.0,
                b: 0.0,
            },
        );
        let batch = batch(&[(addr(1), vec![10.0])]);
        let set = build_constraints(&batch, &landmarks, &store, "oct-m-1");
        assert!(set.is_empty());
        assert_eq!(set.skipped_uncalibrated, 1);
    }
}
