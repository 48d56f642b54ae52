//! Tests for calibration models and the store.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use approx::assert_relative_eq;

use super::*;
use crate::landmarks::LandmarkPosition;

fn store_with(
    variant: &str,
    keys: &[(&str, RangeModel)],
) -> CalibrationStore {
    let landmarks: HashMap<String, RangeModel> = keys
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let mut variants = BTreeMap::new();
    variants.insert(
        variant.to_string(),
        VariantCalibration::PerLandmark { landmarks },
    );
    CalibrationStore::from_variants(variants)
}

#[test]
fn test_cbg_range_uses_minimum_rtt() {
    let model = RangeModel::Cbg {
        m: 100_000.0,
        b: 0.0,
    };
    let range = model.range(&[10.0, 25.0, 80.0]);
    assert_eq!(range.min_m, 0.0);
    assert_relative_eq!(range.max_m, 1_000_000.0);
}

#[test]
fn test_cbg_intercept_is_meters() {
    let model = RangeModel::Cbg {
        m: 50_000.0,
        b: 25_000.0,
    };
    let range = model.range(&[2.0]);
    assert_relative_eq!(range.max_m, 125_000.0);
}

#[test]
fn test_negative_bound_clamps_to_zero() {
    let model = RangeModel::Octant {
        m: 10_000.0,
        b: -100_000.0,
    };
    let range = model.range(&[1.0]);
    assert_eq!(range.max_m, 0.0);
}

#[test]
fn test_gaussian_band_brackets_the_mean() {
    let model = RangeModel::SpotterGaussian {
        m: 100_000.0,
        b: 0.0,
        spread: 50_000.0,
    };
    // Mean RTT is 10 ms, so mu = 1 000 000 m.
    let range = model.range(&[5.0, 10.0, 15.0]);
    assert_relative_eq!(range.min_m, 1_000_000.0 - 1.644_853_6 * 50_000.0);
    assert_relative_eq!(range.max_m, 1_000_000.0 + 1.644_853_6 * 50_000.0);
    assert!(range.min_m < range.max_m);
}

#[test]
fn test_gaussian_lower_bound_floors_at_zero() {
    let model = RangeModel::SpotterGaussian {
        m: 1_000.0,
        b: 0.0,
        spread: 500_000.0,
    };
    let range = model.range(&[1.0]);
    assert_eq!(range.min_m, 0.0);
}

#[test]
fn test_physical_range_two_thirds_light_speed() {
    let range = physical_range(10.0);
    assert_eq!(range.min_m, 0.0);
    // 2/3 c over 5 ms one-way: just under 1000 km.
    assert_relative_eq!(range.max_m, 999_308.193, max_relative = 1e-6);
}

#[test]
fn test_empirical_bound_tighter_than_physics() {
    // A sane calibration never claims more distance than light in cable
    // can cover.
    let model = RangeModel::Cbg {
        m: 90_000.0,
        b: 0.0,
    };
    for rtt in [1.0_f32, 10.0, 120.0] {
        let empirical = model.range(&[rtt]);
        let physical = physical_range(rtt as f64);
        assert!(empirical.max_m <= physical.max_m);
    }
}

#[test]
fn test_lookup_priority_ipv4_label_ilabel() {
    let by_ip = RangeModel::Cbg { m: 1.0, b: 0.0 };
    let by_label = RangeModel::Cbg { m: 2.0, b: 0.0 };
    let by_ilabel = RangeModel::Cbg { m: 3.0, b: 0.0 };

    let lm = LandmarkPosition::new(Ipv4Addr::new(192, 0, 2, 7), "anchor-42", 0.0, 0.0);

    let store = store_with(
        "cbg-m-1",
        &[
            ("192.0.2.7", by_ip.clone()),
            ("anchor-42", by_label.clone()),
            ("42", by_ilabel.clone()),
        ],
    );
    assert_eq!(store.lookup("cbg-m-1", &lm), Some(&by_ip));

    let store = store_with(
        "cbg-m-1",
        &[("anchor-42", by_label.clone()), ("42", by_ilabel.clone())],
    );
    assert_eq!(store.lookup("cbg-m-1", &lm), Some(&by_label));

    let store = store_with("cbg-m-1", &[("42", by_ilabel.clone())]);
    assert_eq!(store.lookup("cbg-m-1", &lm), Some(&by_ilabel));

    let store = store_with("cbg-m-1", &[("other", by_label)]);
    assert_eq!(store.lookup("cbg-m-1", &lm), None);
}

#[test]
fn test_lookup_skips_negative_ilabel() {
    // A landmark whose label has no numeric suffix must not match a
    // literal "-1" key.
    let lm = LandmarkPosition::new(Ipv4Addr::new(192, 0, 2, 9), "gateway", 0.0, 0.0);
    let store = store_with("cbg-m-1", &[("-1", RangeModel::Cbg { m: 1.0, b: 0.0 })]);
    assert_eq!(store.lookup("cbg-m-1", &lm), None);
}

#[test]
fn test_pooled_variant_matches_every_landmark() {
    let global = RangeModel::SpotterUniform {
        m: 80_000.0,
        b: 10_000.0,
    };
    let mut variants = BTreeMap::new();
    variants.insert(
        "spo-m-a".to_string(),
        VariantCalibration::Pooled {
            global: global.clone(),
        },
    );
    let store = CalibrationStore::from_variants(variants);

    let lm = LandmarkPosition::new(Ipv4Addr::new(198, 51, 100, 1), "whatever", 5.0, 5.0);
    assert_eq!(store.lookup("spo-m-a", &lm), Some(&global));
    assert_eq!(store.lookup("cbg-m-1", &lm), None, "unknown variant");
}

#[test]
fn test_artifact_round_trip() {
    let mut landmarks = HashMap::new();
    landmarks.insert(
        "192.0.2.7".to_string(),
        RangeModel::Cbg {
            m: 95_000.0,
            b: 12_000.0,
        },
    );
    landmarks.insert(
        "anchor-3".to_string(),
        RangeModel::Octant {
            m: 88_000.0,
            b: 0.0,
        },
    );
    let mut variants = BTreeMap::new();
    variants.insert(
        "cbg-m-1".to_string(),
        VariantCalibration::PerLandmark { landmarks },
    );
    variants.insert(
        "spo-g-a".to_string(),
        VariantCalibration::Pooled {
            global: RangeModel::SpotterGaussian {
                m: 70_000.0,
                b: 5_000.0,
                spread: 150_000.0,
            },
        },
    );
    let store = CalibrationStore::from_variants(variants);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("calibration.json.gz");
    store.save(&path).unwrap();
    let reloaded = CalibrationStore::load(&path).unwrap();
    assert_eq!(reloaded, store);
}

#[test]
fn test_load_missing_file_reports_path() {
    let err = CalibrationStore::load(Path::new("/nonexistent/calibration.json.gz")).unwrap_err();
    assert!(matches!(err, CalibrationError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/calibration.json.gz"));
}
