//! End-to-end geometry tests over a small district in WGS84
//!
//! The district holds a divided boulevard (two carriageways ~12m apart), a
//! cross street, and a residential spur that crosses the boundary.

use geo::{line_string, polygon, LineString};
use streetmetrics_core::config::ClusterSettings;
use streetmetrics_core::models::{Crs, District, DistrictId, RoadClass, SourceSegment, ValidityMode};
use streetmetrics_geo::{clip_segments, cluster_segments, estimate_group_nodes, estimate_nodes};

fn district() -> District {
    District::new(
        DistrictId(42),
        "Riverside",
        polygon![
            (x: 0.0, y: 0.0),
            (x: 0.01, y: 0.0),
            (x: 0.01, y: 0.01),
            (x: 0.0, y: 0.01),
        ],
    )
    .with_area(1.23)
}

fn feature(id: &str, class: &str, name: Option<&str>, geometry: LineString<f64>) -> SourceSegment {
    SourceSegment {
        feature_id: id.to_string(),
        class: RoadClass::new(class),
        subclass: None,
        name: name.map(str::to_string),
        geometry,
        length_m: None,
        source_version: "2024-06".to_string(),
    }
}

fn sources() -> Vec<SourceSegment> {
    vec![
        feature(
            "blvd-north",
            "primary",
            Some("Harbor Blvd"),
            line_string![(x: 0.001, y: 0.00505), (x: 0.009, y: 0.00505)],
        ),
        feature(
            "blvd-south",
            "primary",
            Some("Harbor Blvd"),
            line_string![(x: 0.001, y: 0.00495), (x: 0.009, y: 0.00495)],
        ),
        feature(
            "cross",
            "secondary",
            Some("Mill St"),
            line_string![(x: 0.005, y: 0.001), (x: 0.005, y: 0.009)],
        ),
        feature(
            "spur",
            "residential",
            None,
            line_string![(x: 0.008, y: 0.008), (x: 0.012, y: 0.008)],
        ),
    ]
}

#[test]
fn test_divided_boulevard_is_counted_once() {
    let clipped =
        clip_segments(&district(), sources(), &Crs::wgs84(), ValidityMode::Lenient).unwrap();
    assert_eq!(clipped.segments.len(), 4);

    let spur = clipped.segments.iter().find(|s| s.feature_id == "spur").unwrap();
    assert!(spur.crosses_boundary);

    let outcome =
        cluster_segments(DistrictId(42), &clipped.segments, &ClusterSettings::default()).unwrap();

    assert_eq!(outcome.groups.len(), 3);
    assert_eq!(outcome.merged, 1);

    let boulevard = outcome.groups.iter().find(|g| g.is_merged()).unwrap();
    assert_eq!(boulevard.name.as_deref(), Some("Harbor Blvd"));
    assert_eq!(boulevard.member_count, 2);

    let raw_total: f64 = clipped.segments.iter().map(|s| s.length_m).sum();
    let grouped_total: f64 = outcome.groups.iter().map(|g| g.length_m).sum();
    assert!((raw_total - grouped_total).abs() < 1e-6);
}

#[test]
fn test_refreshing_same_input_is_identical() {
    let first = clip_segments(&district(), sources(), &Crs::wgs84(), ValidityMode::Lenient).unwrap();
    let second =
        clip_segments(&district(), sources(), &Crs::wgs84(), ValidityMode::Lenient).unwrap();
    assert_eq!(first.segments, second.segments);

    let settings = ClusterSettings::default();
    let a = cluster_segments(DistrictId(42), &first.segments, &settings).unwrap();
    let b = cluster_segments(DistrictId(42), &second.segments, &settings).unwrap();
    assert_eq!(a.groups, b.groups);
}

#[test]
fn test_node_estimates_for_both_segment_sets() {
    let clipped =
        clip_segments(&district(), sources(), &Crs::wgs84(), ValidityMode::Lenient).unwrap();
    let raw = estimate_nodes(clipped.segments.iter().map(|s| &s.geometry), 1e-6).unwrap();

    // No endpoints are shared, so every node is a dead end
    assert_eq!(raw.node_count, 8);
    assert_eq!(raw.dead_end_count, 8);
    assert_eq!(raw.intersection_count, 0);

    let outcome =
        cluster_segments(DistrictId(42), &clipped.segments, &ClusterSettings::default()).unwrap();
    let dedup = estimate_group_nodes(&outcome.groups, &clipped.segments, 1e-6).unwrap();
    assert_eq!(dedup.node_count, 8);
}
