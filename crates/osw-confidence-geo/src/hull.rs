//! Convex hull of the node data

use geo::{Area, ConvexHull, CoordsIter};
use geo::{Coord, Geometry as GeoGeometry, LineString, MultiPoint, Point};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use osw_confidence_core::error::{ConfidenceError, Result};

use crate::artifact::{into_features, read_geojson, write_single_feature};

/// Builds the hull region of a dataset
pub struct RegionBuilder;

impl RegionBuilder {
    /// Compute the convex hull of every geometry in `nodes_file` and write it
    /// to `output_path` as a single-feature GeoJSON collection
    pub fn build_hull(nodes_file: &Path, output_path: &Path) -> Result<PathBuf> {
        let geometries = read_geometries(nodes_file)?;

        let hull = convex_hull(&geometries).ok_or_else(|| ConfidenceError::Geometry {
            path: nodes_file.to_path_buf(),
            reason: "No finite coordinates to build a hull from".to_string(),
        })?;

        write_single_feature(output_path, geojson::Geometry::new(geojson::Value::from(&hull)))?;

        tracing::info!(
            nodes_file = %nodes_file.display(),
            geometry_count = geometries.len(),
            hull = %output_path.display(),
            "Built convex hull"
        );

        Ok(output_path.to_path_buf())
    }
}

/// Read all geometries of a GeoJSON file
///
/// Features without a geometry are ignored. An empty result is an error.
pub fn read_geometries(path: &Path) -> Result<Vec<GeoGeometry<f64>>> {
    let features = into_features(read_geojson(path)?);

    let mut geometries = Vec::with_capacity(features.len());
    for (idx, feature) in features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let geometry =
            GeoGeometry::<f64>::try_from(geometry).map_err(|e| ConfidenceError::Geometry {
                path: path.to_path_buf(),
                reason: format!("Feature {}: {}", idx, e),
            })?;
        geometries.push(geometry);
    }

    if geometries.is_empty() {
        return Err(ConfidenceError::Geometry {
            path: path.to_path_buf(),
            reason: "File contains no geometries".to_string(),
        });
    }

    Ok(geometries)
}

/// Convex hull of the union of `geometries`
///
/// Returns a Polygon in the general case, a Point when every coordinate is the
/// same and a LineString when all coordinates are collinear. `None` when there
/// is no finite coordinate at all.
pub fn convex_hull(geometries: &[GeoGeometry<f64>]) -> Option<GeoGeometry<f64>> {
    let coords: Vec<Coord<f64>> = geometries
        .iter()
        .flat_map(|geometry| geometry.coords_iter())
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .collect();

    let first = *coords.first()?;
    if coords.iter().all(|c| *c == first) {
        return Some(GeoGeometry::Point(Point::from(first)));
    }

    let hull = MultiPoint::from(coords.iter().map(|c| Point::from(*c)).collect::<Vec<_>>())
        .convex_hull();

    if hull.unsigned_area() > 0.0 {
        return Some(GeoGeometry::Polygon(hull));
    }

    // Collinear input: the hull is the segment between the extreme points
    let start = coords.iter().copied().min_by(lexicographic)?;
    let end = coords.iter().copied().max_by(lexicographic)?;
    Some(GeoGeometry::LineString(LineString::new(vec![start, end])))
}

fn lexicographic(a: &Coord<f64>, b: &Coord<f64>) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}
