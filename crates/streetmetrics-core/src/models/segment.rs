use crate::models::DistrictId;
use geo::{LineString, MultiLineString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a raw segment, unique within one district generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a dedup group, unique within one district generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u64);

/// Road classification (`primary`, `residential`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoadClass(String);

impl RoadClass {
    pub fn new(class: impl AsRef<str>) -> Self {
        Self(class.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classes treated as "major roads" when no explicit subset is configured
    pub fn major_roads() -> Vec<RoadClass> {
        [
            "motorway",
            "motorway_link",
            "trunk",
            "trunk_link",
            "primary",
            "primary_link",
            "secondary",
            "secondary_link",
            "tertiary",
            "tertiary_link",
        ]
        .iter()
        .map(RoadClass::new)
        .collect()
    }
}

impl fmt::Display for RoadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoadClass {
    fn from(value: &str) -> Self {
        RoadClass::new(value)
    }
}

/// A road feature as delivered by the upstream geometry source, before clipping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSegment {
    pub feature_id: String,
    pub class: RoadClass,
    pub subclass: Option<String>,
    pub name: Option<String>,
    pub geometry: LineString<f64>,
    /// Length reported by the source, if any. Recomputed after clipping.
    pub length_m: Option<f64>,
    pub source_version: String,
}

/// One road centerline clipped to a district boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub id: SegmentId,
    pub district_id: DistrictId,
    pub feature_id: String,
    pub class: RoadClass,
    pub subclass: Option<String>,
    pub name: Option<String>,
    pub geometry: LineString<f64>,
    pub length_m: f64,
    pub crosses_boundary: bool,
    pub source_version: String,
}

/// One or more raw segments merged as parallel carriageways of one street
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupGroup {
    pub id: GroupId,
    pub district_id: DistrictId,
    /// Sorted member ids
    pub member_ids: Vec<SegmentId>,
    /// Union of the member geometries
    pub geometry: MultiLineString<f64>,
    pub class: RoadClass,
    pub name: Option<String>,
    /// Sum of member lengths, not the measured length of `geometry`
    pub length_m: f64,
    pub member_count: usize,
    /// False for segments outside the clustering class subset
    pub deduplicated: bool,
}

impl DedupGroup {
    pub fn is_merged(&self) -> bool {
        self.member_count > 1
    }
}
