//! Polygon set algebra over geographic regions.
//!
//! A [`Region`] is a possibly multi-part polygon in lon/lat degrees,
//! restricted to the map rectangle (−179.9°..179.9°, −60°..85°). All
//! operations are closed over that rectangle: intersection, difference,
//! area (square degrees, used only for tie-breaking), point containment,
//! emptiness, and validity repair.
//!
//! The map rectangle deliberately stops short of the antimeridian and the
//! poles; disk construction handles those singularities before its output
//! ever reaches this module.

mod basemap;

pub use basemap::{BaseMap, BaseMapError};

use geo::{Area, BooleanOps, Contains, Coord, LineString, MultiPolygon, Point, Polygon, Rect};

/// Western edge of the map rectangle, degrees.
pub const MAP_WEST: f64 = -179.9;
/// Eastern edge of the map rectangle, degrees.
pub const MAP_EAST: f64 = 179.9;
/// Southern edge of the map rectangle, degrees.
pub const MAP_SOUTH: f64 = -60.0;
/// Northern edge of the map rectangle, degrees.
pub const MAP_NORTH: f64 = 85.0;

/// Two regions are "almost equal" when corresponding vertices agree to
/// this many degrees (~1 km at the equator).
pub const ALMOST_EQUAL_DEGREES: f64 = 0.01;

/// Areas below this (square degrees) are treated as empty; boolean
/// operations can leave degenerate slivers behind.
const EMPTY_AREA_SQ_DEG: f64 = 1e-12;

/// A closed region on the map: zero or more polygons in lon/lat degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    shape: MultiPolygon<f64>,
}

impl Region {
    /// The empty region.
    pub fn empty() -> Self {
        Self {
            shape: MultiPolygon::new(Vec::new()),
        }
    }

    /// The full map rectangle.
    pub fn map_rectangle() -> Self {
        let rect = Rect::new(
            Coord {
                x: MAP_WEST,
                y: MAP_SOUTH,
            },
            Coord {
                x: MAP_EAST,
                y: MAP_NORTH,
            },
        );
        Self {
            shape: MultiPolygon::new(vec![rect.to_polygon()]),
        }
    }

    /// Build a region from raw polygons, normalizing any self-touching
    /// geometry the way [`Region::repair`] does.
    pub fn from_polygons(polygons: Vec<Polygon<f64>>) -> Self {
        Self {
            shape: MultiPolygon::new(polygons),
        }
        .repair()
    }

    /// Build a region from an exterior ring of `(lon, lat)` coordinates.
    /// The ring is closed automatically.
    pub fn from_ring(ring: Vec<Coord<f64>>) -> Self {
        Self::from_polygons(vec![Polygon::new(LineString::new(ring), Vec::new())])
    }

    /// Direct access to the underlying multi-polygon.
    pub fn as_multi_polygon(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    /// Intersection with another region.
    pub fn intersection(&self, other: &Region) -> Region {
        Region {
            shape: self.shape.intersection(&other.shape),
        }
    }

    /// Set difference `self \ other`.
    pub fn difference(&self, other: &Region) -> Region {
        Region {
            shape: self.shape.difference(&other.shape),
        }
    }

    /// Union with another region.
    pub fn union(&self, other: &Region) -> Region {
        Region {
            shape: self.shape.union(&other.shape),
        }
    }

    /// Area in square degrees.
    ///
    /// Square degrees are not an equal-area measure, but the engine only
    /// compares areas of near-coincident candidates for tie-breaking, so
    /// the distortion is irrelevant.
    pub fn area(&self) -> f64 {
        self.shape.unsigned_area()
    }

    /// Whether the point `(lon, lat)` lies in the interior of the region.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.shape.contains(&Point::new(lon, lat))
    }

    /// Whether the region is empty (no rings, or only degenerate slivers).
    pub fn is_empty(&self) -> bool {
        self.shape.0.is_empty() || self.area() < EMPTY_AREA_SQ_DEG
    }

    /// Re-derive a valid polygon set from possibly self-touching input.
    ///
    /// Seam surgery on disk rings can produce coincident excursions; a
    /// union against the empty set re-runs the overlay sweep and yields
    /// clean rings, the moral equivalent of shapely's `buffer(0)`.
    pub fn repair(self) -> Region {
        if self.shape.0.is_empty() {
            return self;
        }
        Region {
            shape: self.shape.union(&MultiPolygon::new(Vec::new())),
        }
    }

    /// Vertex-wise comparison at the [`ALMOST_EQUAL_DEGREES`] tolerance.
    ///
    /// True when both regions have the same ring structure and every
    /// corresponding vertex pair agrees to 0.01° in both coordinates. Two
    /// empty regions are almost equal.
    pub fn almost_equal(&self, other: &Region) -> bool {
        if self.is_empty() || other.is_empty() {
            return self.is_empty() && other.is_empty();
        }
        if self.shape.0.len() != other.shape.0.len() {
            return false;
        }
        for (pa, pb) in self.shape.0.iter().zip(other.shape.0.iter()) {
            if pa.interiors().len() != pb.interiors().len() {
                return false;
            }
            let rings_a = std::iter::once(pa.exterior()).chain(pa.interiors());
            let rings_b = std::iter::once(pb.exterior()).chain(pb.interiors());
            for (ra, rb) in rings_a.zip(rings_b) {
                if ra.0.len() != rb.0.len() {
                    return false;
                }
                for (ca, cb) in ra.0.iter().zip(rb.0.iter()) {
                    if (ca.x - cb.x).abs() > ALMOST_EQUAL_DEGREES
                        || (ca.y - cb.y).abs() > ALMOST_EQUAL_DEGREES
                    {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Geocentric centroid of the region's exterior vertices.
    ///
    /// Vertices are taken to the unit sphere, averaged in Cartesian
    /// space, and projected back; averaging in lon/lat directly would
    /// misbehave near the antimeridian. Returns `None` for empty regions.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let (mut x, mut y, mut z, mut n) = (0.0_f64, 0.0_f64, 0.0_f64, 0usize);
        for polygon in &self.shape.0 {
            for c in &polygon.exterior().0 {
                let (lat, lon) = (c.y.to_radians(), c.x.to_radians());
                x += lat.cos() * lon.cos();
                y += lat.cos() * lon.sin();
                z += lat.sin();
                n += 1;
            }
        }
        if n == 0 {
            return None;
        }
        let (x, y, z) = (x / n as f64, y / n as f64, z / n as f64);
        let hyp = x.hypot(y);
        if hyp == 0.0 && z == 0.0 {
            return None;
        }
        Some((y.atan2(x).to_degrees(), z.atan2(hyp).to_degrees()))
    }
}
