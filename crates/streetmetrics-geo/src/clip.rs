//! Clip upstream road features to a district boundary.

use crate::projection::line_length_m;
use crate::validation::check_ingest;
use geo::{BooleanOps, Contains, Intersects, LineString, MultiLineString, MultiPolygon, Point};
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{Crs, District, RawSegment, SegmentId, SourceSegment, ValidityMode};

/// Result of clipping one district's source features
#[derive(Debug, Clone, Default)]
pub struct ClipOutcome {
    /// Clipped segments with ids assigned in feature-id order
    pub segments: Vec<RawSegment>,
    /// Invalid or empty geometries left out
    pub skipped: usize,
    /// Features with no part inside the boundary
    pub outside: usize,
}

enum Placement {
    Inside,
    Outside,
    Crossing,
}

fn placement(boundary: &MultiPolygon<f64>, line: &LineString<f64>) -> Placement {
    let touches_ring = boundary.0.iter().any(|polygon| {
        polygon.exterior().intersects(line)
            || polygon.interiors().iter().any(|ring| ring.intersects(line))
    });
    if touches_ring {
        return Placement::Crossing;
    }

    // No ring is crossed, so the first vertex decides for the whole line
    match line.0.first() {
        Some(first) if boundary.contains(&Point::from(*first)) => Placement::Inside,
        _ => Placement::Outside,
    }
}

fn usable_source_length(length_m: Option<f64>) -> Option<f64> {
    length_m.filter(|l| l.is_finite() && *l >= 0.0)
}

/// Clip source features to the district boundary.
///
/// Features entirely inside keep their geometry (and the source length when
/// it is usable). Features crossing the boundary are cut, may split into
/// several segments, and are flagged with `crosses_boundary`. Output is
/// deterministic: features are processed in `feature_id` order and segment
/// ids count up from 1.
pub fn clip_segments(
    district: &District,
    mut sources: Vec<SourceSegment>,
    crs: &Crs,
    validity: ValidityMode,
) -> Result<ClipOutcome> {
    let boundary = district
        .boundary
        .as_ref()
        .ok_or(StreetmetricsError::MissingBoundary { id: district.id })?;

    sources.sort_by(|a, b| a.feature_id.cmp(&b.feature_id));

    let mut outcome = ClipOutcome::default();
    let mut next_id = 1u64;

    for source in sources {
        if !check_ingest(&source.feature_id, &source.geometry, validity)? {
            outcome.skipped += 1;
            continue;
        }

        let pieces: Vec<(LineString<f64>, f64, bool)> = match placement(boundary, &source.geometry) {
            Placement::Outside => {
                outcome.outside += 1;
                continue;
            }
            Placement::Inside => {
                let length = usable_source_length(source.length_m)
                    .unwrap_or_else(|| line_length_m(crs, &source.geometry));
                vec![(source.geometry.clone(), length, false)]
            }
            Placement::Crossing => {
                let clipped =
                    boundary.clip(&MultiLineString::new(vec![source.geometry.clone()]), false);
                clipped
                    .0
                    .into_iter()
                    .filter(|piece| piece.0.len() >= 2)
                    .map(|piece| {
                        let length = line_length_m(crs, &piece);
                        (piece, length, true)
                    })
                    .filter(|(_, length, _)| *length > 0.0)
                    .collect()
            }
        };

        if pieces.is_empty() {
            outcome.outside += 1;
            continue;
        }

        for (geometry, length_m, crosses_boundary) in pieces {
            outcome.segments.push(RawSegment {
                id: SegmentId(next_id),
                district_id: district.id,
                feature_id: source.feature_id.clone(),
                class: source.class.clone(),
                subclass: source.subclass.clone(),
                name: source.name.clone(),
                geometry,
                length_m,
                crosses_boundary,
                source_version: source.source_version.clone(),
            });
            next_id += 1;
        }
    }

    tracing::debug!(
        district_id = %district.id,
        segments = outcome.segments.len(),
        skipped = outcome.skipped,
        outside = outcome.outside,
        "Clipped segments to boundary"
    );

    Ok(outcome)
}
