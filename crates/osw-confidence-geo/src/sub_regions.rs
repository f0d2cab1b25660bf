//! Caller-supplied sub-region files

use geojson::FeatureCollection;
use std::fs;
use std::path::Path;

use osw_confidence_core::error::{ConfidenceError, Result};
use osw_confidence_core::models::SubRegion;

use crate::validation::{validate_feature_collection, ValidationResult};

/// Outcome of parsing a sub-region file
#[derive(Debug, Clone)]
pub enum SubRegions {
    /// One entry per feature, in file order
    Valid(Vec<SubRegion>),
    /// The file is not a usable FeatureCollection
    Invalid(ValidationResult),
}

impl SubRegions {
    pub fn is_valid(&self) -> bool {
        matches!(self, SubRegions::Valid(_))
    }

    /// The parsed regions, or `None` for an invalid file
    pub fn into_regions(self) -> Option<Vec<SubRegion>> {
        match self {
            SubRegions::Valid(regions) => Some(regions),
            SubRegions::Invalid(_) => None,
        }
    }

    /// The parsed regions, or a non-fatal validation error naming `path`
    pub fn into_result(self, path: &Path) -> Result<Vec<SubRegion>> {
        match self {
            SubRegions::Valid(regions) => Ok(regions),
            SubRegions::Invalid(report) => Err(ConfidenceError::SubRegionValidation {
                path: path.to_path_buf(),
                reason: report.summary(),
            }),
        }
    }
}

/// Parses sub-region collections
pub struct SubRegionSplitter;

impl SubRegionSplitter {
    /// Validate and split the file at `path` into sub-regions
    ///
    /// Never fails: an unreadable or malformed file yields
    /// [`SubRegions::Invalid`] with the reasons.
    pub fn parse(path: &Path) -> SubRegions {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => return SubRegions::Invalid(ValidationResult::single("$", e.to_string())),
        };

        let value: serde_json::Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                return SubRegions::Invalid(ValidationResult::single(
                    "$",
                    format!("Not valid JSON: {}", e),
                ))
            }
        };

        let validation = validate_feature_collection(&value);
        if !validation.is_valid {
            return SubRegions::Invalid(validation);
        }

        let collection = match serde_json::from_value::<FeatureCollection>(value) {
            Ok(collection) => collection,
            Err(e) => return SubRegions::Invalid(ValidationResult::single("$", e.to_string())),
        };

        let regions: Vec<SubRegion> = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| SubRegion::new(index, feature))
            .collect();

        for region in regions.iter().filter(|r| r.polygon().is_none()) {
            tracing::info!(
                index = region.index,
                geometry_type = region.geometry_type(),
                "Sub-region is not a Polygon, it will not be scored"
            );
        }

        SubRegions::Valid(regions)
    }
}
