use geo::{Coord, LineString, MultiPolygon, Polygon};
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::ValidityMode;

/// Validation result with details
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Validation error with location details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub reason: String,
}

impl ValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        Self { is_valid: true, errors: Vec::new() }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, location: String, reason: String) {
        self.is_valid = false;
        self.errors.push(ValidationError { location, reason });
    }

    /// First error reason, for single-line reporting
    pub fn first_reason(&self) -> String {
        self.errors
            .first()
            .map(|e| format!("{}: {}", e.location, e.reason))
            .unwrap_or_else(|| "invalid geometry".to_string())
    }
}

fn coord_is_finite(coord: &Coord<f64>) -> bool {
    coord.x.is_finite() && coord.y.is_finite()
}

/// Validate a segment centerline: at least two vertices, all finite
pub fn validate_linestring(linestring: &LineString<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if linestring.0.len() < 2 {
        result.add_error(
            "LineString".to_string(),
            format!("LineString must have at least 2 points, found {}", linestring.0.len()),
        );
        return result;
    }

    for (i, coord) in linestring.0.iter().enumerate() {
        if !coord_is_finite(coord) {
            result
                .add_error(format!("LineString[{}]", i), "Coordinates must be finite".to_string());
        }
    }

    result
}

/// Validate a centerline that is about to be buffered.
///
/// On top of [`validate_linestring`], the line needs two distinct vertices; a
/// line collapsed onto one point has no direction to buffer along.
pub fn validate_bufferable(linestring: &LineString<f64>) -> ValidationResult {
    let mut result = validate_linestring(linestring);

    if result.is_valid {
        let first = linestring.0[0];
        if linestring.0.iter().all(|c| *c == first) {
            result.add_error(
                "LineString".to_string(),
                "LineString collapses to a single point".to_string(),
            );
        }
    }

    result
}

fn validate_polygon(polygon: &Polygon<f64>, location: &str) -> ValidationResult {
    let mut result = ValidationResult::valid();

    let exterior = polygon.exterior();
    if exterior.0.len() < 4 {
        result.add_error(
            format!("{} exterior", location),
            format!("Polygon exterior must have at least 4 points, found {}", exterior.0.len()),
        );
    }

    if let (Some(first), Some(last)) = (exterior.0.first(), exterior.0.last()) {
        if first != last {
            result.add_error(
                format!("{} exterior", location),
                "Polygon exterior must be closed (first point == last point)".to_string(),
            );
        }
    }

    if !exterior.0.iter().all(coord_is_finite) {
        result.add_error(format!("{} exterior", location), "Coordinates must be finite".to_string());
    }

    result
}

/// Validate a district boundary
pub fn validate_boundary(boundary: &MultiPolygon<f64>) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if boundary.0.is_empty() {
        result.add_error("MultiPolygon".to_string(), "Boundary has no polygons".to_string());
        return result;
    }

    for (i, polygon) in boundary.0.iter().enumerate() {
        let poly_result = validate_polygon(polygon, &format!("MultiPolygon[{}]", i));
        for error in poly_result.errors {
            result.add_error(error.location, error.reason);
        }
    }

    result
}

fn apply_mode(segment: &str, validation: ValidationResult, mode: ValidityMode) -> Result<bool> {
    if validation.is_valid {
        return Ok(true);
    }

    match mode {
        ValidityMode::Lenient => {
            tracing::debug!(segment, reason = %validation.first_reason(), "Skipping invalid segment");
            Ok(false)
        }
        ValidityMode::Strict => Err(StreetmetricsError::InvalidGeometry {
            segment: segment.to_string(),
            reason: validation.first_reason(),
        }),
    }
}

/// Check a segment during ingest under the configured validity mode.
///
/// Returns `Ok(true)` for usable geometry, `Ok(false)` when the segment should
/// be skipped (lenient mode), and an error in strict mode.
pub fn check_ingest(segment: &str, linestring: &LineString<f64>, mode: ValidityMode) -> Result<bool> {
    apply_mode(segment, validate_linestring(linestring), mode)
}

/// Same as [`check_ingest`], but also rejects lines that cannot be buffered
pub fn check_bufferable(
    segment: &str,
    linestring: &LineString<f64>,
    mode: ValidityMode,
) -> Result<bool> {
    apply_mode(segment, validate_bufferable(linestring), mode)
}
