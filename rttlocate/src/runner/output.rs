//! Region output files.
//!
//! One GeoJSON `Feature` per (batch, variant): the geometry is the
//! region's multi-polygon (empty for empty regions) and the properties
//! are the batch metadata with its annotation map flattened in. The
//! filename is `<tag>-<batch_id>.geojson`, where `tag` is either the
//! variant identifier or an error tag.

use std::io;
use std::path::{Path, PathBuf};

use geojson::{Feature, Geometry, JsonObject, Value};
use thiserror::Error;

use crate::db::BatchMetadata;
use crate::region::Region;

/// Extension of region output files.
pub const OUTPUT_EXT: &str = "geojson";

/// Tag for a batch whose region exists but touches no land.
pub const TAG_AT_SEA: &str = "at-sea";
/// Tag for a batch with no feasible region.
pub const TAG_EMPTY_INTERSECTION: &str = "empty-intersection";
/// Tag for a batch with no usable landmark observations.
pub const TAG_NO_OBSERVATIONS: &str = "no-observations";

/// Errors writing region files.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot write region file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// `<tag>-<batch_id>.geojson`
pub fn region_file_name(tag: &str, batch_id: i64) -> String {
    format!("{tag}-{batch_id}.{OUTPUT_EXT}")
}

/// Serialize a region and its batch metadata as a GeoJSON feature.
pub fn region_feature(region: &Region, metadata: &BatchMetadata) -> Feature {
    let properties: JsonObject = match serde_json::to_value(metadata) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => JsonObject::new(),
    };
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(region.as_multi_polygon()))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Write the region file for one (batch, variant) and return its path.
pub async fn write_region(
    dir: &Path,
    tag: &str,
    batch_id: i64,
    region: &Region,
    metadata: &BatchMetadata,
) -> Result<PathBuf, OutputError> {
    let path = dir.join(region_file_name(tag, batch_id));
    let feature = region_feature(region, metadata);
    tokio::fs::write(&path, feature.to_string())
        .await
        .map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;

    fn metadata() -> BatchMetadata {
        let mut meta = BatchMetadata {
            id: 42,
            client_lon: -122.0,
            client_lat: 37.0,
            client_addr: None,
            proxied: false,
            proxy_lon: None,
            proxy_lat: None,
            proxy_addr: None,
            annotations: Default::default(),
        };
        meta.annotate("variant", "cbg-m-1");
        meta.annotate("on_land", true);
        meta
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(region_file_name("cbg-m-1", 42), "cbg-m-1-42.geojson");
        assert_eq!(
            region_file_name(TAG_EMPTY_INTERSECTION, 7),
            "empty-intersection-7.geojson"
        );
    }

    #[test]
    fn test_feature_carries_annotations() {
        let feature = region_feature(&Region::map_rectangle(), &metadata());
        let props = feature.properties.unwrap();
        assert_eq!(props["variant"], "cbg-m-1");
        assert_eq!(props["on_land"], true);
        assert_eq!(props["id"], 42);
        assert!(feature.geometry.is_some());
    }

    #[tokio::test]
    async fn test_write_and_parse_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_region(
            dir.path(),
            "cbg-m-1",
            42,
            &Region::map_rectangle(),
            &metadata(),
        )
        .await
        .unwrap();
        assert!(path.ends_with("cbg-m-1-42.geojson"));

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: geojson::GeoJson = text.parse().unwrap();
        match parsed {
            geojson::GeoJson::Feature(f) => {
                assert!(matches!(
                    f.geometry.unwrap().value,
                    Value::MultiPolygon(_)
                ));
            }
            other => panic!("expected a Feature, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_region_still_writes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_region(
            dir.path(),
            TAG_EMPTY_INTERSECTION,
            7,
            &Region::empty(),
            &metadata(),
        )
        .await
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("MultiPolygon"));
    }
}
