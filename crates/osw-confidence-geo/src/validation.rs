//! Structural validation of GeoJSON feature collections
//!
//! Checks a raw JSON value against the shape rules of a GeoJSON
//! FeatureCollection before it is deserialized, so every problem can be
//! reported with its location instead of failing on the first one.

use serde_json::{Map, Value};

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Create an invalid result with errors
    pub fn invalid(errors: Vec<ValidationError>) -> Self {
        Self { is_valid: false, errors }
    }

    /// Invalid result with a single error
    pub fn single(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::invalid(vec![ValidationError { location: location.into(), reason: reason.into() }])
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    /// One-line description of all errors
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.location, e.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validate that `value` is a well-formed GeoJSON FeatureCollection
pub fn validate_feature_collection(value: &Value) -> ValidationResult {
    let mut result = ValidationResult::valid();

    let Some(object) = value.as_object() else {
        result.add_error("$".to_string(), "Document must be a JSON object".to_string());
        return result;
    };

    expect_type(object, "FeatureCollection", "$", &mut result);
    validate_bbox(object, "$", &mut result);

    match object.get("features") {
        Some(Value::Array(features)) => {
            for (i, feature) in features.iter().enumerate() {
                validate_feature(feature, &format!("features[{}]", i), &mut result);
            }
        }
        Some(_) => result.add_error("$.features".to_string(), "Must be an array".to_string()),
        None => result.add_error("$".to_string(), "Missing required member 'features'".to_string()),
    }

    result
}

fn validate_feature(value: &Value, location: &str, result: &mut ValidationResult) {
    let Some(object) = value.as_object() else {
        result.add_error(location.to_string(), "Feature must be a JSON object".to_string());
        return;
    };

    expect_type(object, "Feature", location, result);
    validate_bbox(object, location, result);

    match object.get("properties") {
        Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(_) => result.add_error(
            format!("{}.properties", location),
            "Must be an object or null".to_string(),
        ),
        None => result.add_error(
            location.to_string(),
            "Missing required member 'properties'".to_string(),
        ),
    }

    match object.get("geometry") {
        Some(Value::Null) => {}
        Some(geometry) => validate_geometry(geometry, &format!("{}.geometry", location), result),
        None => {
            result.add_error(location.to_string(), "Missing required member 'geometry'".to_string())
        }
    }
}

fn validate_geometry(value: &Value, location: &str, result: &mut ValidationResult) {
    let Some(object) = value.as_object() else {
        result.add_error(location.to_string(), "Geometry must be an object or null".to_string());
        return;
    };

    validate_bbox(object, location, result);

    let Some(kind) = object.get("type").and_then(Value::as_str) else {
        result.add_error(location.to_string(), "Missing geometry 'type'".to_string());
        return;
    };

    if kind == "GeometryCollection" {
        match object.get("geometries") {
            Some(Value::Array(geometries)) => {
                for (i, geometry) in geometries.iter().enumerate() {
                    validate_geometry(geometry, &format!("{}.geometries[{}]", location, i), result);
                }
            }
            _ => result.add_error(
                location.to_string(),
                "GeometryCollection requires a 'geometries' array".to_string(),
            ),
        }
        return;
    }

    let coords_location = format!("{}.coordinates", location);
    let Some(coordinates) = object.get("coordinates") else {
        result.add_error(location.to_string(), "Missing 'coordinates'".to_string());
        return;
    };

    match kind {
        "Point" => validate_position(coordinates, &coords_location, result),
        "MultiPoint" => validate_positions(coordinates, 0, &coords_location, result),
        "LineString" => validate_positions(coordinates, 2, &coords_location, result),
        "MultiLineString" => {
            for_each_member(coordinates, &coords_location, result, |line, loc, result| {
                validate_positions(line, 2, loc, result)
            })
        }
        "Polygon" => validate_rings(coordinates, &coords_location, result),
        "MultiPolygon" => {
            for_each_member(coordinates, &coords_location, result, |polygon, loc, result| {
                validate_rings(polygon, loc, result)
            })
        }
        other => {
            result.add_error(location.to_string(), format!("Unknown geometry type '{}'", other))
        }
    }
}

fn validate_rings(value: &Value, location: &str, result: &mut ValidationResult) {
    for_each_member(value, location, result, |ring, loc, result| {
        validate_positions(ring, 4, loc, result)
    })
}

fn validate_positions(
    value: &Value,
    min_len: usize,
    location: &str,
    result: &mut ValidationResult,
) {
    let Some(positions) = value.as_array() else {
        result.add_error(location.to_string(), "Must be an array of positions".to_string());
        return;
    };

    if positions.len() < min_len {
        result.add_error(
            location.to_string(),
            format!("Must contain at least {} positions, found {}", min_len, positions.len()),
        );
    }

    for (i, position) in positions.iter().enumerate() {
        validate_position(position, &format!("{}[{}]", location, i), result);
    }
}

fn validate_position(value: &Value, location: &str, result: &mut ValidationResult) {
    match value.as_array() {
        Some(numbers) if numbers.len() >= 2 && numbers.iter().all(Value::is_number) => {}
        _ => result.add_error(
            location.to_string(),
            "Position must be an array of at least 2 numbers".to_string(),
        ),
    }
}

fn for_each_member<F>(value: &Value, location: &str, result: &mut ValidationResult, mut check: F)
where
    F: FnMut(&Value, &str, &mut ValidationResult),
{
    let Some(members) = value.as_array() else {
        result.add_error(location.to_string(), "Must be an array".to_string());
        return;
    };

    for (i, member) in members.iter().enumerate() {
        check(member, &format!("{}[{}]", location, i), result);
    }
}

fn expect_type(
    object: &Map<String, Value>,
    expected: &str,
    location: &str,
    result: &mut ValidationResult,
) {
    match object.get("type").and_then(Value::as_str) {
        Some(kind) if kind == expected => {}
        Some(kind) => result.add_error(
            format!("{}.type", location),
            format!("Expected '{}', found '{}'", expected, kind),
        ),
        None => result.add_error(location.to_string(), format!("Missing 'type' = '{}'", expected)),
    }
}

fn validate_bbox(object: &Map<String, Value>, location: &str, result: &mut ValidationResult) {
    let Some(bbox) = object.get("bbox") else {
        return;
    };

    match bbox.as_array() {
        Some(values) if values.len() >= 4 && values.iter().all(Value::is_number) => {}
        _ => result.add_error(
            format!("{}.bbox", location),
            "Must be an array of at least 4 numbers".to_string(),
        ),
    }
}
