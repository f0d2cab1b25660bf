//! Reading and writing GeoJSON artifacts on disk

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject};
use std::fs;
use std::path::Path;

use osw_confidence_core::error::{ConfidenceError, Result};

/// Parse a GeoJSON document from a file
pub fn read_geojson(path: &Path) -> Result<GeoJson> {
    let content = fs::read_to_string(path).map_err(|e| ConfidenceError::Geometry {
        path: path.to_path_buf(),
        reason: format!("Cannot read file: {}", e),
    })?;

    content.parse::<GeoJson>().map_err(|e| ConfidenceError::Geometry {
        path: path.to_path_buf(),
        reason: format!("Failed to parse GeoJSON: {}", e),
    })
}

/// Flatten any GeoJSON document into its features
///
/// A bare geometry becomes a single feature without properties.
pub fn into_features(geojson: GeoJson) -> Vec<Feature> {
    match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![feature(Some(geometry), None)],
    }
}

/// Build a feature from a geometry and optional properties
pub fn feature(geometry: Option<Geometry>, properties: Option<JsonObject>) -> Feature {
    Feature { bbox: None, geometry, id: None, properties, foreign_members: None }
}

/// Wrap features in a collection
pub fn feature_collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection { bbox: None, features, foreign_members: None }
}

/// Write a feature collection to `path`
pub fn write_feature_collection(path: &Path, collection: &FeatureCollection) -> Result<()> {
    let json = serde_json::to_string(collection)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write one geometry as a single-feature collection with empty properties
pub fn write_single_feature(path: &Path, geometry: Geometry) -> Result<()> {
    let collection = feature_collection(vec![feature(Some(geometry), Some(JsonObject::new()))]);
    write_feature_collection(path, &collection)
}
