//! The land base map.
//!
//! A vector polygon dataset of world land area (minus major lakes and
//! glaciated regions), loaded once from GeoJSON and clipped to the map
//! rectangle. Shared read-only across workers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use geo_types::{Geometry, Polygon};
use geojson::GeoJson;
use thiserror::Error;
use tracing::{debug, warn};

use super::Region;

/// Errors loading the base map.
#[derive(Debug, Error)]
pub enum BaseMapError {
    #[error("cannot read base map '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse base map '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },

    #[error("base map '{path}' contains no polygonal land geometry")]
    NoLand { path: PathBuf },
}

/// The land polygon, clipped to the map rectangle.
#[derive(Debug, Clone)]
pub struct BaseMap {
    land: Region,
}

impl BaseMap {
    /// Load a GeoJSON land dataset and clip it to the map rectangle.
    ///
    /// Every `Polygon` and `MultiPolygon` geometry in the file contributes
    /// to the land region; other geometry types are ignored with a
    /// warning.
    pub fn load(path: &Path) -> Result<Self, BaseMapError> {
        let text = fs::read_to_string(path).map_err(|source| BaseMapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let geojson: GeoJson = text.parse().map_err(|source| BaseMapError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        let mut polygons = Vec::new();
        collect_geojson_polygons(&geojson, &mut polygons, path);
        if polygons.is_empty() {
            return Err(BaseMapError::NoLand {
                path: path.to_path_buf(),
            });
        }

        let land = Region::from_polygons(polygons).intersection(&Region::map_rectangle());
        debug!(
            area_sq_deg = land.area(),
            "loaded base map from {}",
            path.display()
        );
        Ok(Self { land })
    }

    /// Build a base map directly from a region (tests and tooling).
    pub fn from_region(land: Region) -> Self {
        Self {
            land: land.intersection(&Region::map_rectangle()),
        }
    }

    /// The land region.
    pub fn land(&self) -> &Region {
        &self.land
    }
}

fn collect_geojson_polygons(geojson: &GeoJson, out: &mut Vec<Polygon<f64>>, path: &Path) {
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(geometry) = &feature.geometry {
                    collect_geometry(geometry.clone(), out, path);
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geometry) = &feature.geometry {
                collect_geometry(geometry.clone(), out, path);
            }
        }
        GeoJson::Geometry(geometry) => collect_geometry(geometry.clone(), out, path),
    }
}

fn collect_geometry(geometry: geojson::Geometry, out: &mut Vec<Polygon<f64>>, path: &Path) {
    let converted: Result<Geometry<f64>, _> = geometry.try_into();
    match converted {
        Ok(geometry) => collect_polygons(geometry, out),
        Err(error) => {
            warn!(path = %path.display(), %error, "skipping unconvertible base map geometry");
        }
    }
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0 {
                collect_polygons(g, out);
            }
        }
        other => {
            warn!(kind = ?kind_of(&other), "ignoring non-polygonal base map geometry");
        }
    }
}

fn kind_of(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
