//! Constraint disks on the globe.
//!
//! A disk is the set of all points within a given geodesic distance of a
//! reference point, materialized as a closed polygon in lon/lat degrees.
//! The construction samples the circle through the azimuthal-equidistant
//! projection (60 geodesic direct shots at 6° azimuth steps) and then
//! repairs the two coordinate singularities:
//!
//! - rings that cross the ±180° seam once enclose a pole and get a
//!   diversion to latitude ±85° spanning the full breadth of the map;
//! - rings that cross the seam twice straddle it without enclosing a pole
//!   and are split into one polygon per hemisphere, each closed against
//!   its ±180° edge.
//!
//! Very large disks can project to the complement of the area they ought
//! to cover; the orientation check catches that and subtracts the ring
//! from the map rectangle instead.


use geo::{Coord, LineString, Polygon};
use thiserror::Error;
use tracing::debug;

use crate::geodesic::{direct, GeodesicError};
use crate::region::Region;

/// Above this radius (≈ half Earth circumference) the projected ring is
/// numerically worthless; the disk is the entire map rectangle.
pub const FULL_MAP_RADIUS_M: f64 = 19_975_000.0;

/// Disks smaller than this collapse under projection; radii are clamped
/// up to a 10 km diameter.
pub const MIN_RADIUS_M: f64 = 5_000.0;

/// Number of vertices sampled around the circle.
pub const RING_POINTS: usize = 60;

/// Latitude of the pole diversion; matches the northern map bound.
const POLE_DIVERSION_LAT: f64 = 85.0;

/// Errors from disk construction.
#[derive(Debug, Error)]
pub enum DiskError {
    /// The sampled ring crossed the antimeridian three or more times, or
    /// the repaired polygon failed its orientation invariant.
    #[error("disk at ({lon}, {lat}) radius {radius_m} m: {reason}")]
    NumericDomain {
        lon: f64,
        lat: f64,
        radius_m: f64,
        reason: String,
    },

    #[error(transparent)]
    Geodesic(#[from] GeodesicError),
}

/// A constraint disk: reference point, radius, and its polygon on the map.
#[derive(Debug, Clone)]
pub struct Disk {
    lon: f64,
    lat: f64,
    radius_m: f64,
    region: Region,
    area: f64,
}

impl Disk {
    /// Reference longitude, degrees.
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Reference latitude, degrees.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Radius in meters (after clamping).
    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// The disk's polygon, clipped to the map rectangle.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Cached polygon area in square degrees.
    pub fn area(&self) -> f64 {
        self.area
    }
}

/// Build the disk of radius `radius_m` meters around `(ref_lon, ref_lat)`.
///
/// The returned disk's region always contains the reference point (before
/// map-rectangle clipping); radii are clamped to [`MIN_RADIUS_M`] and
/// radii above [`FULL_MAP_RADIUS_M`] short-circuit to the whole map.
///
/// # Errors
///
/// `NumericDomain` for non-finite inputs, rings with three or more seam
/// crossings, or polygons that fail the orientation invariant even after
/// complementing.
pub fn build(ref_lon: f64, ref_lat: f64, radius_m: f64) -> Result<Disk, DiskError> {
    if !ref_lon.is_finite() || !ref_lat.is_finite() || !radius_m.is_finite() {
        // +∞ radius is a legitimate "unconstrained" bound.
        if radius_m == f64::INFINITY && ref_lon.is_finite() && ref_lat.is_finite() {
            return Ok(full_map_disk(ref_lon, ref_lat, radius_m));
        }
        return Err(GeodesicError::NumericDomain {
            context: "disk build",
        }
        .into());
    }

    if radius_m > FULL_MAP_RADIUS_M {
        return Ok(full_map_disk(ref_lon, ref_lat, radius_m));
    }
    let radius_m = radius_m.max(MIN_RADIUS_M);

    let ring = sample_ring(ref_lon, ref_lat, radius_m)?;
    let crossings = seam_crossings(&ring);

    let raw = match crossings.len() {
        0 => Region::from_polygons(vec![ring_to_polygon(ring)]),
        1 => {
            debug!(ref_lon, ref_lat, radius_m, "disk encloses a pole");
            Region::from_polygons(vec![pole_diversion(ring, crossings[0])])
        }
        2 => {
            debug!(ref_lon, ref_lat, radius_m, "disk straddles the antimeridian");
            Region::from_polygons(seam_split(ring, crossings[0], crossings[1]))
        }
        n => {
            return Err(DiskError::NumericDomain {
                lon: ref_lon,
                lat: ref_lat,
                radius_m,
                reason: format!("{n} antimeridian crossings in sampled ring"),
            })
        }
    };

    // A very large projected disk can enclose the complement of the area
    // it ought to enclose; detect via the reference point and invert.
    let oriented = if raw.contains(ref_lon, ref_lat) {
        raw
    } else {
        let inverted = Region::map_rectangle().difference(&raw);
        if !inverted.contains(ref_lon, ref_lat) {
            return Err(DiskError::NumericDomain {
                lon: ref_lon,
                lat: ref_lat,
                radius_m,
                reason: "polygon excludes its reference point even after complement".into(),
            });
        }
        inverted
    };

    let region = oriented.intersection(&Region::map_rectangle());
    let area = region.area();
    Ok(Disk {
        lon: ref_lon,
        lat: ref_lat,
        radius_m,
        region,
        area,
    })
}

fn full_map_disk(ref_lon: f64, ref_lat: f64, radius_m: f64) -> Disk {
    let region = Region::map_rectangle();
    let area = region.area();
    Disk {
        lon: ref_lon,
        lat: ref_lat,
        radius_m,
        region,
        area,
    }
}

/// Sample the circle as `RING_POINTS` vertices via geodesic direct shots.
fn sample_ring(ref_lon: f64, ref_lat: f64, radius_m: f64) -> Result<Vec<Coord<f64>>, DiskError> {
    let step = 360.0 / RING_POINTS as f64;
    let mut ring = Vec::with_capacity(RING_POINTS);
    for i in 0..RING_POINTS {
        let azimuth = step * i as f64;
        let (lat, lon) = direct(ref_lat, ref_lon, azimuth, radius_m)?;
        ring.push(Coord { x: lon, y: lat });
    }
    Ok(ring)
}

/// Indices `i` where the edge from vertex `i` to vertex `i+1` (cyclic)
/// jumps across the ±180° seam.
fn seam_crossings(ring: &[Coord<f64>]) -> Vec<usize> {
    let n = ring.len();
    (0..n)
        .filter(|&i| (ring[(i + 1) % n].x - ring[i].x).abs() > 180.0)
        .collect()
}

fn ring_to_polygon(mut ring: Vec<Coord<f64>>) -> Polygon<f64> {
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    Polygon::new(LineString::new(ring), Vec::new())
}

/// One seam crossing: the disk encloses a pole. Rotate the ring so the
/// crossing sits between the last and first vertices, then append a
/// diversion along the seam to ±85° and back, covering the full breadth
/// of the map at the enclosed pole.
fn pole_diversion(ring: Vec<Coord<f64>>, crossing: usize) -> Polygon<f64> {
    let n = ring.len();
    let mut rotated: Vec<Coord<f64>> = Vec::with_capacity(n + 4);
    rotated.extend_from_slice(&ring[crossing + 1..]);
    rotated.extend_from_slice(&ring[..=crossing]);

    let last = rotated[n - 1];
    let first = rotated[0];
    let near = if last.x < 0.0 { -180.0 } else { 180.0 };
    let pole = if last.y < 0.0 {
        -POLE_DIVERSION_LAT
    } else {
        POLE_DIVERSION_LAT
    };
    rotated.push(Coord { x: near, y: last.y });
    rotated.push(Coord { x: near, y: pole });
    rotated.push(Coord { x: -near, y: pole });
    rotated.push(Coord {
        x: -near,
        y: first.y,
    });
    ring_to_polygon(rotated)
}

/// Two seam crossings: the disk straddles the seam without enclosing a
/// pole. Split the ring at the crossings and close each part against the
/// ±180° edge on its side.
fn seam_split(ring: Vec<Coord<f64>>, c1: usize, c2: usize) -> Vec<Polygon<f64>> {
    let n = ring.len();
    let east_part: Vec<Coord<f64>> = (c1 + 1..=c2).map(|i| ring[i]).collect();
    let west_part: Vec<Coord<f64>> = (c2 + 1..c2 + 1 + (n - (c2 - c1)))
        .map(|i| ring[i % n])
        .collect();

    [east_part, west_part]
        .into_iter()
        .filter(|part| part.len() >= 2)
        .map(|mut part| {
            let last = part[part.len() - 1];
            let first = part[0];
            let edge = if last.x < 0.0 { -180.0 } else { 180.0 };
            part.push(Coord { x: edge, y: last.y });
            part.push(Coord { x: edge, y: first.y });
            ring_to_polygon(part)
        })
        .collect()
}
