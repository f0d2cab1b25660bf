//! Region types flowing between the pipeline stages.

use geojson::{Feature, Geometry};
use std::path::PathBuf;

/// Property carrying the oracle score on every output feature
pub const CONFIDENCE_SCORE_PROPERTY: &str = "confidence_score";

/// Result of unpacking a dataset archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArchive {
    /// Materialized path of the node data, if the archive had one
    pub nodes_file: Option<PathBuf>,
    /// Every entry name in archive listing order
    pub entries: Vec<String>,
}

/// One feature of a caller-supplied sub-region file
#[derive(Debug, Clone, PartialEq)]
pub struct SubRegion {
    /// Position of the feature in the source file
    pub index: usize,
    /// The source feature, kept whole so its properties survive into the output
    pub feature: Feature,
}

impl SubRegion {
    pub fn new(index: usize, feature: Feature) -> Self {
        Self { index, feature }
    }

    /// The polygon to score, or `None` when the geometry is anything but a Polygon
    pub fn polygon(&self) -> Option<&Geometry> {
        self.feature
            .geometry
            .as_ref()
            .filter(|geometry| matches!(geometry.value, geojson::Value::Polygon(_)))
    }

    /// Name of the geometry type, for log lines
    pub fn geometry_type(&self) -> &'static str {
        self.feature.geometry.as_ref().map(|g| geometry_type_name(&g.value)).unwrap_or("null")
    }
}

/// GeoJSON `type` member of a geometry value
pub fn geometry_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// A sub-region together with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSubRegion {
    pub region: SubRegion,
    pub score: Option<f64>,
}

/// Scores of one job: the hull and each sub-region in source order
#[derive(Debug, Clone, PartialEq)]
pub struct RegionScores {
    pub hull: f64,
    pub sub_regions: Vec<Option<f64>>,
}
