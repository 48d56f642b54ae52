//! Tests for outcome classification.

use geo::Coord;
use serde_json::json;

use super::*;
use crate::solver::Solution;

fn rect(west: f64, south: f64, east: f64, north: f64) -> Region {
    Region::from_ring(vec![
        Coord { x: west, y: south },
        Coord { x: east, y: south },
        Coord { x: east, y: north },
        Coord { x: west, y: north },
    ])
}

fn metadata() -> BatchMetadata {
    BatchMetadata {
        id: 9,
        client_lon: 0.0,
        client_lat: 0.0,
        client_addr: None,
        proxied: false,
        proxy_lon: None,
        proxy_lat: None,
        proxy_addr: None,
        annotations: Default::default(),
    }
}

fn solution(region: Region, physical_selected: usize, physical_total: usize) -> Solution {
    Solution {
        region,
        included: 0b1,
        cardinality: 1,
        physical_selected,
        physical_total,
    }
}

#[test]
fn test_classify_on_land() {
    let basemap = BaseMap::from_region(rect(-30.0, 30.0, 30.0, 60.0));
    let mut meta = metadata();
    let (tag, region) = classify(
        &solution(rect(-10.0, 40.0, 10.0, 50.0), 2, 2),
        &basemap,
        &mut meta,
        "cbg-m-1",
    );
    assert_eq!(tag, "cbg-m-1");
    assert!(!region.is_empty());
    assert_eq!(meta.annotation("on_land"), Some(&json!(true)));
}

#[test]
fn test_classify_land_clip_shrinks_region() {
    // Half the solved region is off the coast; the published region is
    // the land part only.
    let basemap = BaseMap::from_region(rect(0.0, 30.0, 30.0, 60.0));
    let mut meta = metadata();
    let (_, region) = classify(
        &solution(rect(-10.0, 40.0, 10.0, 50.0), 1, 1),
        &basemap,
        &mut meta,
        "cbg-m-1",
    );
    assert!(region.contains(5.0, 45.0));
    assert!(!region.contains(-5.0, 45.0));
}

#[test]
fn test_classify_at_sea_keeps_region_unclipped() {
    let basemap = BaseMap::from_region(rect(-30.0, 30.0, 30.0, 60.0));
    let mut meta = metadata();
    let solved = rect(100.0, -20.0, 110.0, -10.0);
    let (tag, region) = classify(&solution(solved.clone(), 1, 1), &basemap, &mut meta, "cbg-m-1");
    assert_eq!(tag, TAG_AT_SEA);
    assert_eq!(region, solved);
    assert_eq!(meta.annotation("on_land"), Some(&json!(false)));
}

#[test]
fn test_classify_incomplete_physical_pass_is_empty_intersection() {
    let basemap = BaseMap::from_region(rect(-30.0, 30.0, 30.0, 60.0));
    let mut meta = metadata();
    let (tag, region) = classify(
        &solution(rect(-10.0, 40.0, 10.0, 50.0), 1, 2),
        &basemap,
        &mut meta,
        "cbg-m-1",
    );
    assert_eq!(tag, TAG_EMPTY_INTERSECTION);
    assert!(region.is_empty());
    assert_eq!(meta.annotation("on_land"), Some(&json!(false)));
}

#[test]
fn test_classify_records_inclusion_diagnostics() {
    let basemap = BaseMap::from_region(rect(-30.0, 30.0, 30.0, 60.0));
    let mut meta = metadata();
    classify(
        &solution(rect(-10.0, 40.0, 10.0, 50.0), 2, 2),
        &basemap,
        &mut meta,
        "cbg-m-1",
    );
    assert_eq!(meta.annotation("included_disks"), Some(&json!("0x1")));
    assert_eq!(meta.annotation("num_disks_included"), Some(&json!(1)));
}
