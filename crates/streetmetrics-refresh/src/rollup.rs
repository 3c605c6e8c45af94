//! Per-district rollup aggregation.

use chrono::Utc;
use std::collections::BTreeMap;
use streetmetrics_core::models::{
    ClassTotals, DedupGroup, District, RawSegment, RoadClass, RollupRecord, SegmentSet,
    METERS_PER_KILOMETER, METERS_PER_MILE,
};

/// Version of the source data behind a refresh.
///
/// The highest segment version wins; districts without segments fall back to
/// the boundary version.
pub fn data_version(district: &District, segments: &[RawSegment]) -> String {
    segments
        .iter()
        .map(|s| s.source_version.as_str())
        .max()
        .unwrap_or(&district.source_version)
        .to_string()
}

fn build_record<'a>(
    district: &District,
    calculation_type: SegmentSet,
    items: impl Iterator<Item = (&'a RoadClass, f64)>,
    source_version: &str,
    generation: u64,
) -> RollupRecord {
    let mut total_count = 0u64;
    let mut total_length_m = 0.0;
    let mut by_class: BTreeMap<RoadClass, ClassTotals> = BTreeMap::new();

    for (class, length_m) in items {
        total_count += 1;
        total_length_m += length_m;
        let totals = by_class.entry(class.clone()).or_default();
        totals.count += 1;
        totals.length_m += length_m;
    }

    let total_length_km = total_length_m / METERS_PER_KILOMETER;
    let area = district.usable_area();

    RollupRecord {
        district_id: district.id,
        calculation_type,
        total_count,
        total_length_m,
        total_length_km,
        total_length_mi: total_length_m / METERS_PER_MILE,
        count_density: area.map(|a| total_count as f64 / a),
        length_density: area.map(|a| total_length_km / a),
        by_class,
        source_version: source_version.to_string(),
        generation,
        computed_at: Utc::now(),
    }
}

/// Compute the raw and deduplicated rollups of one district.
///
/// Totals are summed in id order so unchanged input yields bit-identical
/// numbers. Densities are `None` when the district has no usable area.
pub fn aggregate_rollups(
    district: &District,
    segments: &[RawSegment],
    groups: &[DedupGroup],
    generation: u64,
) -> Vec<RollupRecord> {
    let source_version = data_version(district, segments);

    let mut raw: Vec<&RawSegment> = segments.iter().collect();
    raw.sort_by_key(|s| s.id);
    let mut dedup: Vec<&DedupGroup> = groups.iter().collect();
    dedup.sort_by_key(|g| g.id);

    vec![
        build_record(
            district,
            SegmentSet::Raw,
            raw.into_iter().map(|s| (&s.class, s.length_m)),
            &source_version,
            generation,
        ),
        build_record(
            district,
            SegmentSet::Deduplicated,
            dedup.into_iter().map(|g| (&g.class, g.length_m)),
            &source_version,
            generation,
        ),
    ]
}
