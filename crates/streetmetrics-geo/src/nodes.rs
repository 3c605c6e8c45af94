//! Intersection estimation from segment endpoints.

use geo::{Coord, LineString};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{DedupGroup, DistrictId, NodeSummary, RawSegment, SegmentId, SegmentSet};

/// Grid cell an endpoint snaps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub i64, pub i64);

/// Snap a coordinate to the grid of the given precision
pub fn node_key(coord: Coord<f64>, precision: f64) -> NodeKey {
    NodeKey((coord.x / precision).round() as i64, (coord.y / precision).round() as i64)
}

/// Degree statistics of the snapped endpoint graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeEstimate {
    pub degrees: BTreeMap<NodeKey, u32>,
    pub node_count: u64,
    /// Nodes of degree three or more
    pub intersection_count: u64,
    pub through_count: u64,
    pub dead_end_count: u64,
}

impl NodeEstimate {
    fn from_degrees(degrees: BTreeMap<NodeKey, u32>) -> Self {
        let mut estimate = Self { node_count: degrees.len() as u64, ..Default::default() };
        for degree in degrees.values() {
            match degree {
                0 => {}
                1 => estimate.dead_end_count += 1,
                2 => estimate.through_count += 1,
                _ => estimate.intersection_count += 1,
            }
        }
        estimate.degrees = degrees;
        estimate
    }

    pub fn into_summary(
        self,
        district_id: DistrictId,
        segment_set: SegmentSet,
        snap_precision: f64,
        generation: u64,
    ) -> NodeSummary {
        NodeSummary {
            district_id,
            node_count: self.node_count,
            intersection_count: self.intersection_count,
            through_count: self.through_count,
            dead_end_count: self.dead_end_count,
            segment_set,
            snap_precision,
            generation,
        }
    }
}

fn check_precision(precision: f64) -> Result<()> {
    if precision.is_finite() && precision > 0.0 {
        Ok(())
    } else {
        Err(StreetmetricsError::compute(
            "node estimation",
            format!("snap precision must be a positive number, got {}", precision),
        ))
    }
}

fn endpoints(line: &LineString<f64>) -> Option<(Coord<f64>, Coord<f64>)> {
    match (line.0.first(), line.0.last()) {
        (Some(first), Some(last)) if line.0.len() >= 2 => Some((*first, *last)),
        _ => None,
    }
}

/// Count node degrees over raw segment lines.
///
/// Each line contributes both endpoints, so a closed ring adds two to the
/// degree of its single node.
pub fn estimate_nodes<'a>(
    lines: impl IntoIterator<Item = &'a LineString<f64>>,
    precision: f64,
) -> Result<NodeEstimate> {
    check_precision(precision)?;

    let mut degrees: BTreeMap<NodeKey, u32> = BTreeMap::new();
    for line in lines {
        if let Some((start, end)) = endpoints(line) {
            *degrees.entry(node_key(start, precision)).or_default() += 1;
            *degrees.entry(node_key(end, precision)).or_default() += 1;
        }
    }

    Ok(NodeEstimate::from_degrees(degrees))
}

/// Count node degrees over deduplicated groups.
///
/// Endpoints come from each group's member segments. A merged group counts
/// once per distinct endpoint key; a singleton behaves like its raw segment.
pub fn estimate_group_nodes(
    groups: &[DedupGroup],
    segments: &[RawSegment],
    precision: f64,
) -> Result<NodeEstimate> {
    check_precision(precision)?;

    let by_id: HashMap<SegmentId, &RawSegment> = segments.iter().map(|s| (s.id, s)).collect();
    let mut degrees: BTreeMap<NodeKey, u32> = BTreeMap::new();

    for group in groups {
        let member_lines = group.member_ids.iter().filter_map(|id| by_id.get(id)).map(|s| &s.geometry);

        if group.member_count <= 1 {
            for line in member_lines {
                if let Some((start, end)) = endpoints(line) {
                    *degrees.entry(node_key(start, precision)).or_default() += 1;
                    *degrees.entry(node_key(end, precision)).or_default() += 1;
                }
            }
            continue;
        }

        let keys: BTreeSet<NodeKey> = member_lines
            .filter_map(endpoints)
            .flat_map(|(start, end)| [node_key(start, precision), node_key(end, precision)])
            .collect();
        for key in keys {
            *degrees.entry(key).or_default() += 1;
        }
    }

    Ok(NodeEstimate::from_degrees(degrees))
}
