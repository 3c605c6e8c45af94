use serde::Serialize;
use std::collections::BTreeMap;
use streetmetrics_core::models::{
    DedupGroup, DistrictId, NodeSummary, RefreshLogEntry, RollupRecord, SegmentSet,
};
use streetmetrics_geo::TileCoord;
use streetmetrics_refresh::{BudgetInputs, DistrictReport, Freshness, TrendPoint};
use uuid::Uuid;

/// Output for refresh command
#[derive(Debug, Serialize)]
pub struct RefreshOutput {
    pub run_id: Uuid,
    pub total: usize,
    pub succeeded: Vec<DistrictReport>,
    pub failed: Vec<FailedDistrict>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct FailedDistrict {
    pub district_id: DistrictId,
    pub kind: String,
    pub error: String,
}

/// Output for status command
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub districts: Vec<DistrictStatus>,
}

#[derive(Debug, Serialize)]
pub struct DistrictStatus {
    pub district_id: DistrictId,
    pub name: String,
    pub active: bool,
    pub published_generation: Option<u64>,
    pub stale: bool,
    pub freshness: Freshness,
}

/// Output for inspect config command
#[derive(Debug, Serialize)]
pub struct InspectConfigOutput {
    pub values: BTreeMap<String, ConfigValue<String>>,
}

#[derive(Debug, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: String,
}

/// Output for inspect district command
#[derive(Debug, Serialize)]
pub struct InspectDistrictOutput {
    pub district_id: DistrictId,
    pub name: String,
    pub generation: Option<u64>,
    pub rollups: Vec<RollupRecord>,
    pub nodes: Option<NodeSummary>,
    pub budget: Option<BudgetInputs>,
    pub groups: Vec<GroupInfo>,
}

/// A deduplicated group without its geometry
#[derive(Debug, Serialize)]
pub struct GroupInfo {
    pub id: u64,
    pub district_id: DistrictId,
    pub class: String,
    pub name: Option<String>,
    pub length_m: f64,
    pub member_count: usize,
    pub deduplicated: bool,
}

impl From<&DedupGroup> for GroupInfo {
    fn from(group: &DedupGroup) -> Self {
        Self {
            id: group.id.0,
            district_id: group.district_id,
            class: group.class.as_str().to_string(),
            name: group.name.clone(),
            length_m: group.length_m,
            member_count: group.member_count,
            deduplicated: group.deduplicated,
        }
    }
}

/// Output for inspect log command
#[derive(Debug, Serialize)]
pub struct InspectLogOutput {
    pub entries: Vec<RefreshLogEntry>,
}

/// Output for tiles command
#[derive(Debug, Serialize)]
pub struct TilesOutput {
    pub tile: TileCoord,
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub bounds: [f64; 4],
    pub groups: Vec<GroupInfo>,
}

/// Output for trend command
#[derive(Debug, Serialize)]
pub struct TrendOutput {
    pub district_id: DistrictId,
    pub segment_set: SegmentSet,
    pub points: Vec<TrendPoint>,
}
