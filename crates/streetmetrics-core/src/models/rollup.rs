use crate::models::{DistrictId, RoadClass};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which segment set a rollup or node estimate was computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentSet {
    #[default]
    Raw,
    Deduplicated,
}

/// Calculation type of a rollup record
pub type CalculationType = SegmentSet;

impl SegmentSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentSet::Raw => "raw",
            SegmentSet::Deduplicated => "deduplicated",
        }
    }
}

impl fmt::Display for SegmentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-class totals inside a rollup
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassTotals {
    pub count: u64,
    pub length_m: f64,
}

/// Precomputed per-district summary for one calculation type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupRecord {
    pub district_id: DistrictId,
    pub calculation_type: CalculationType,
    pub total_count: u64,
    pub total_length_m: f64,
    pub total_length_km: f64,
    pub total_length_mi: f64,
    /// Segments (or groups) per square kilometer; `None` when the area is unknown or zero
    pub count_density: Option<f64>,
    /// Kilometers per square kilometer; `None` when the area is unknown or zero
    pub length_density: Option<f64>,
    pub by_class: BTreeMap<RoadClass, ClassTotals>,
    pub source_version: String,
    pub generation: u64,
    pub computed_at: DateTime<Utc>,
}

impl RollupRecord {
    /// Compare the computed values, ignoring bookkeeping fields
    pub fn same_totals(&self, other: &RollupRecord) -> bool {
        self.calculation_type == other.calculation_type
            && self.total_count == other.total_count
            && self.total_length_m.to_bits() == other.total_length_m.to_bits()
            && self.total_length_km.to_bits() == other.total_length_km.to_bits()
            && self.total_length_mi.to_bits() == other.total_length_mi.to_bits()
            && self.count_density.map(f64::to_bits) == other.count_density.map(f64::to_bits)
            && self.length_density.map(f64::to_bits) == other.length_density.map(f64::to_bits)
            && self.by_class == other.by_class
    }
}

/// Node degree statistics for one district generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub district_id: DistrictId,
    pub node_count: u64,
    /// Nodes with degree >= 3
    pub intersection_count: u64,
    /// Nodes with degree == 2
    pub through_count: u64,
    /// Nodes with degree == 1
    pub dead_end_count: u64,
    pub segment_set: SegmentSet,
    pub snap_precision: f64,
    pub generation: u64,
}
