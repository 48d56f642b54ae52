//! Tests for WGS-84 geodesic computations.

use approx::assert_relative_eq;

use super::*;

#[test]
fn test_direct_due_north_from_equator() {
    // One degree of latitude along a meridian is ~110.57 km at the equator.
    let (lat, lon) = direct(0.0, 0.0, 0.0, 110_574.0).unwrap();
    assert_relative_eq!(lat, 1.0, epsilon = 1e-3);
    assert_relative_eq!(lon, 0.0, epsilon = 1e-9);
}

#[test]
fn test_direct_due_east_wraps_longitude() {
    // Travel east from just west of the antimeridian; the destination
    // longitude must come back wrapped into (−180, 180].
    let (_, lon) = direct(0.0, 179.5, 90.0, 200_000.0).unwrap();
    assert!(
        (-180.0..=180.0).contains(&lon),
        "longitude {lon} not wrapped"
    );
    assert!(lon < -178.0, "expected a point east of the seam, got {lon}");
}

#[test]
fn test_direct_round_trips_with_distance() {
    // direct() then distance_m() must agree to 1 part in 1e6 out to
    // 20 000 km, across azimuths and latitudes.
    for &(lat, lon) in &[(0.0, 0.0), (37.4, -122.1), (-45.0, 170.0), (80.0, 10.0)] {
        for &dist in &[5_000.0, 1_000_000.0, 19_900_000.0] {
            for az in [0.0, 60.0, 135.0, 250.0] {
                let (lat2, lon2) = direct(lat, lon, az, dist).unwrap();
                let measured = distance_m(lon, lat, lon2, lat2).unwrap();
                assert_relative_eq!(measured, dist, max_relative = 1e-6);
            }
        }
    }
}

#[test]
fn test_direct_rejects_non_finite_input() {
    assert_eq!(
        direct(f64::NAN, 0.0, 0.0, 1000.0),
        Err(GeodesicError::NumericDomain {
            context: "geodesic direct"
        })
    );
    assert!(direct(0.0, 0.0, f64::INFINITY, 1000.0).is_err());
    assert!(direct(0.0, 0.0, 0.0, f64::NAN).is_err());
}

#[test]
fn test_distance_known_pair() {
    // San Francisco to New York is roughly 4 130 km.
    let d = distance_m(-122.42, 37.77, -74.01, 40.71).unwrap();
    assert!(
        (4_120_000.0..4_160_000.0).contains(&d),
        "SF-NYC distance {d} out of expected range"
    );
}

#[test]
fn test_aeqd_forward_inverse_round_trip() {
    let proj = AzimuthalEquidistant::new(-122.1, 37.4).unwrap();
    for &(lon, lat) in &[(-122.1, 37.4), (-120.0, 39.0), (-130.0, 30.0), (10.0, 50.0)] {
        let (x, y) = proj.forward(lon, lat).unwrap();
        let (lon2, lat2) = proj.inverse(x, y).unwrap();
        assert_relative_eq!(lon2, lon, epsilon = 1e-6);
        assert_relative_eq!(lat2, lat, epsilon = 1e-6);
    }
}

#[test]
fn test_aeqd_preserves_distance_from_center() {
    // A point on the circle of radius r in projected space is exactly r
    // meters from the center on the ellipsoid.
    let proj = AzimuthalEquidistant::new(5.0, 52.0).unwrap();
    let r = 750_000.0;
    for az_deg in [0.0, 45.0, 171.0, 304.0] {
        let az = f64::to_radians(az_deg);
        let (lon, lat) = proj.inverse(r * az.sin(), r * az.cos()).unwrap();
        let measured = distance_m(5.0, 52.0, lon, lat).unwrap();
        assert_relative_eq!(measured, r, max_relative = 1e-6);
    }
}

#[test]
fn test_aeqd_center_maps_to_origin() {
    let proj = AzimuthalEquidistant::new(30.0, -10.0).unwrap();
    let (x, y) = proj.forward(30.0, -10.0).unwrap();
    assert_eq!((x, y), (0.0, 0.0));
    let (lon, lat) = proj.inverse(0.0, 0.0).unwrap();
    assert_eq!((lon, lat), (30.0, -10.0));
}
