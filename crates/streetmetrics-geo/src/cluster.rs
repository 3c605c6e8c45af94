//! Parallel-segment clustering.
//!
//! Divided roads usually arrive as two centerlines, one per carriageway. The
//! engine merges such pairs (and longer chains) into one representative
//! group so district totals count the street once.

use crate::projection::LocalProjection;
use crate::validation::check_bufferable;
use geo::{BoundingRect, Distance, Euclidean, LineString, MultiLineString};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, RTreeObject};
use std::collections::BTreeMap;
use streetmetrics_core::config::ClusterSettings;
use streetmetrics_core::error::Result;
use streetmetrics_core::models::{DedupGroup, DistrictId, GroupId, RawSegment};

type Envelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Disjoint-set forest with path compression and union by rank
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        Self { parent: (0..size).collect(), rank: vec![0; size] }
    }

    pub fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    pub fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);
        if px == py {
            return;
        }
        if self.rank[px] < self.rank[py] {
            self.parent[px] = py;
        } else if self.rank[px] > self.rank[py] {
            self.parent[py] = px;
        } else {
            self.parent[py] = px;
            self.rank[px] += 1;
        }
    }

    pub fn connected(&mut self, x: usize, y: usize) -> bool {
        self.find(x) == self.find(y)
    }
}

/// Result of clustering one district
#[derive(Debug, Clone, Default)]
pub struct ClusterOutcome {
    /// Partition of the usable input segments, ordered by smallest member id
    pub groups: Vec<DedupGroup>,
    /// Degenerate segments left out under lenient validity
    pub skipped: usize,
    /// Segments in the clustering class subset that were considered for merging
    pub candidates: usize,
    /// Groups with more than one member
    pub merged: usize,
}

/// Group near-duplicate parallel segments of one district.
///
/// Segments whose class is outside `settings.classes` pass through as
/// singleton groups. Two candidates belong together when they share class
/// and name, lie within twice the buffer tolerance of each other, and their
/// lengths differ by less than the length tolerance; groups are the connected
/// components of that relation.
pub fn cluster_segments(
    district_id: DistrictId,
    segments: &[RawSegment],
    settings: &ClusterSettings,
) -> Result<ClusterOutcome> {
    let mut ordered: Vec<&RawSegment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.id);

    let mut candidates = Vec::new();
    let mut passthrough = Vec::new();
    let mut skipped = 0;

    for segment in ordered {
        if !settings.includes(&segment.class) {
            passthrough.push(segment);
            continue;
        }
        if check_bufferable(&segment.id.to_string(), &segment.geometry, settings.validity)? {
            candidates.push(segment);
        } else {
            skipped += 1;
        }
    }

    let components = connected_components(&candidates, settings);

    let mut members: Vec<Vec<&RawSegment>> = components
        .into_iter()
        .map(|indices| indices.into_iter().map(|i| candidates[i]).collect())
        .collect();
    members.extend(passthrough.into_iter().map(|segment| vec![segment]));
    members.sort_by_key(|group| group[0].id);

    let groups: Vec<DedupGroup> = members
        .iter()
        .enumerate()
        .map(|(i, group)| build_group(district_id, GroupId(i as u64 + 1), group))
        .collect();
    let merged = groups.iter().filter(|g| g.is_merged()).count();

    tracing::debug!(
        district_id = %district_id,
        candidates = candidates.len(),
        groups = groups.len(),
        merged,
        skipped,
        "Clustered segments"
    );

    Ok(ClusterOutcome { groups, skipped, candidates: candidates.len(), merged })
}

/// Index lists of each component, each sorted ascending
fn connected_components(candidates: &[&RawSegment], settings: &ClusterSettings) -> Vec<Vec<usize>> {
    let projection =
        LocalProjection::for_lines(&settings.crs, candidates.iter().map(|s| &s.geometry));
    let projected: Vec<LineString<f64>> =
        candidates.iter().map(|s| projection.project(&s.geometry)).collect();

    let tolerance = settings.buffer_tolerance_m;
    let envelopes: Vec<Envelope> = projected
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            line.bounding_rect().map(|rect| {
                let aabb = Rectangle::from_corners(
                    [rect.min().x - tolerance, rect.min().y - tolerance],
                    [rect.max().x + tolerance, rect.max().y + tolerance],
                );
                GeomWithData::new(aabb, i)
            })
        })
        .collect();
    let tree = RTree::bulk_load(envelopes);

    let mut uf = UnionFind::new(candidates.len());
    for item in tree.iter() {
        let i = item.data;
        for other in tree.locate_in_envelope_intersecting(&item.envelope()) {
            let j = other.data;
            if j <= i || uf.connected(i, j) {
                continue;
            }
            if is_parallel_candidate(candidates[i], candidates[j], settings)
                && Euclidean.distance(&projected[i], &projected[j]) <= 2.0 * tolerance
            {
                uf.union(i, j);
            }
        }
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..candidates.len() {
        let root = uf.find(i);
        components.entry(root).or_default().push(i);
    }
    components.into_values().collect()
}

/// Attribute rules for candidacy; the distance rule is checked separately
fn is_parallel_candidate(a: &RawSegment, b: &RawSegment, settings: &ClusterSettings) -> bool {
    a.class == b.class
        && a.name == b.name
        && relative_length_difference(a.length_m, b.length_m) < settings.length_tolerance
}

fn relative_length_difference(a: f64, b: f64) -> f64 {
    let longest = a.max(b);
    if longest <= 0.0 {
        return 0.0;
    }
    (a - b).abs() / longest
}

fn build_group(district_id: DistrictId, id: GroupId, members: &[&RawSegment]) -> DedupGroup {
    let mut lines: Vec<LineString<f64>> = Vec::with_capacity(members.len());
    for member in members {
        if !lines.contains(&member.geometry) {
            lines.push(member.geometry.clone());
        }
    }

    let first = members[0];
    DedupGroup {
        id,
        district_id,
        member_ids: members.iter().map(|m| m.id).collect(),
        geometry: MultiLineString::new(lines),
        class: first.class.clone(),
        name: first.name.clone(),
        length_m: members.iter().map(|m| m.length_m).sum(),
        member_count: members.len(),
        deduplicated: members.len() > 1,
    }
}
