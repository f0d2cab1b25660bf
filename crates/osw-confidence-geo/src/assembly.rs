//! Assembly of the scored result collection

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use std::path::Path;

use osw_confidence_core::error::{ConfidenceError, Result};
use osw_confidence_core::models::{ScoredSubRegion, CONFIDENCE_SCORE_PROPERTY};

use crate::artifact::{feature, feature_collection, into_features, read_geojson};

/// Merges hull and sub-region scores into one collection
pub struct ResultAssembler;

impl ResultAssembler {
    /// Read the hull geometry back from its artifact
    ///
    /// The artifact must hold exactly one feature with a geometry.
    pub fn read_hull(hull_path: &Path) -> Result<Geometry> {
        let mut features = into_features(read_geojson(hull_path)?);

        if features.len() != 1 {
            return Err(ConfidenceError::Invariant(format!(
                "hull artifact {} holds {} features, expected exactly 1",
                hull_path.display(),
                features.len()
            )));
        }

        features.remove(0).geometry.ok_or_else(|| {
            ConfidenceError::Invariant(format!(
                "hull artifact {} has no geometry",
                hull_path.display()
            ))
        })
    }

    /// Build the output collection: the hull at index 0, then the
    /// sub-regions in source order
    pub fn assemble(
        hull: Geometry,
        hull_score: f64,
        sub_regions: Option<Vec<ScoredSubRegion>>,
    ) -> FeatureCollection {
        let sub_regions = sub_regions.unwrap_or_default();
        let mut features = Vec::with_capacity(1 + sub_regions.len());

        features.push(scored_feature(Some(hull), JsonObject::new(), Some(hull_score), 0));

        for (offset, scored) in sub_regions.into_iter().enumerate() {
            let source = scored.region.feature;
            features.push(scored_feature(
                source.geometry,
                source.properties.unwrap_or_default(),
                scored.score,
                offset + 1,
            ));
        }

        feature_collection(features)
    }

    /// [`read_hull`](Self::read_hull) followed by [`assemble`](Self::assemble)
    pub fn assemble_from_artifact(
        hull_path: &Path,
        hull_score: f64,
        sub_regions: Option<Vec<ScoredSubRegion>>,
    ) -> Result<FeatureCollection> {
        let hull = Self::read_hull(hull_path)?;
        let collection = Self::assemble(hull, hull_score, sub_regions);

        tracing::debug!(feature_count = collection.features.len(), "Assembled confidence scores");

        Ok(collection)
    }
}

fn scored_feature(
    geometry: Option<Geometry>,
    mut properties: JsonObject,
    score: Option<f64>,
    position: usize,
) -> Feature {
    let score = score
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null);
    properties.insert(CONFIDENCE_SCORE_PROPERTY.to_string(), score);

    let mut feature = feature(geometry, Some(properties));
    feature.id = Some(Id::String(position.to_string()));
    feature
}
