//! Read helpers for downstream consumers.
//!
//! All reads go through the published generation, so a consumer never sees
//! a half-written refresh.

use chrono::{DateTime, Utc};
use serde::Serialize;
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{
    Crs, DedupGroup, DistrictId, RefreshLogEntry, RefreshOperation, RollupRecord, SegmentSet,
};
use streetmetrics_geo::TileCoord;
use streetmetrics_store::RefreshStore;

/// Inputs for the budget formula of one district
#[derive(Debug, Clone, Serialize)]
pub struct BudgetInputs {
    pub district_id: DistrictId,
    pub raw: RollupRecord,
    pub deduplicated: RollupRecord,
    pub intersections: u64,
    pub generation: u64,
}

/// Reads of a district's published generation retried when a publish lands
/// between them
const SNAPSHOT_ATTEMPTS: usize = 3;

/// Budget inputs from the published generation, `None` before the first
/// successful refresh.
///
/// Rollups and the node summary come from separate reads. Both must carry the
/// same generation, so the pair is re-read when a publish slips in between.
pub async fn budget_inputs(
    store: &dyn RefreshStore,
    district_id: DistrictId,
) -> Result<Option<BudgetInputs>> {
    let mut mismatch = None;
    for _ in 0..SNAPSHOT_ATTEMPTS {
        let rollups = store.rollups(district_id).await?;
        let pick = |set: SegmentSet| rollups.iter().find(|r| r.calculation_type == set).cloned();

        let (Some(raw), Some(deduplicated)) =
            (pick(SegmentSet::Raw), pick(SegmentSet::Deduplicated))
        else {
            return Ok(None);
        };
        let Some(nodes) = store.node_summary(district_id).await? else {
            return Ok(None);
        };

        if raw.generation == deduplicated.generation && raw.generation == nodes.generation {
            return Ok(Some(BudgetInputs {
                district_id,
                generation: raw.generation,
                intersections: nodes.intersection_count,
                raw,
                deduplicated,
            }));
        }

        tracing::debug!(
            district_id = %district_id,
            rollups = raw.generation,
            nodes = nodes.generation,
            "Generation changed during budget read, retrying"
        );
        mismatch = Some((raw.generation, nodes.generation));
    }

    let (expected, found) = mismatch.unzip();
    Err(StreetmetricsError::ConcurrentRefresh { id: district_id, expected, found })
}

/// How current the published data of a district is
#[derive(Debug, Clone, Serialize)]
pub struct Freshness {
    pub district_id: DistrictId,
    pub last_success: Option<DateTime<Utc>>,
    /// Seconds since `last_success`
    pub age_secs: Option<i64>,
    pub source_version: Option<String>,
    /// Most recent failure logged after the last success
    pub last_error: Option<RefreshLogEntry>,
}

impl Freshness {
    pub fn is_stale(&self, max_age_secs: i64) -> bool {
        self.age_secs.map_or(true, |age| age > max_age_secs)
    }
}

pub async fn freshness(
    store: &dyn RefreshStore,
    district_id: DistrictId,
    now: DateTime<Utc>,
) -> Result<Freshness> {
    let log = store.refresh_log(Some(district_id)).await?;

    let last_success = log
        .iter()
        .rev()
        .find(|e| e.success && e.operation == RefreshOperation::CompleteRefresh);
    let last_error = log
        .iter()
        .rev()
        .take_while(|e| last_success.map_or(true, |s| e.id > s.id))
        .find(|e| !e.success)
        .cloned();

    Ok(Freshness {
        district_id,
        last_success: last_success.map(|e| e.logged_at),
        age_secs: last_success.map(|e| (now - e.logged_at).num_seconds()),
        source_version: last_success.and_then(|e| e.source_version.clone()),
        last_error,
    })
}

/// Deduplicated groups of every district overlapping one map tile.
///
/// `crs` is the CRS the groups were stored in.
pub async fn groups_in_tile(
    store: &dyn RefreshStore,
    tile: TileCoord,
    crs: &Crs,
) -> Result<Vec<DedupGroup>> {
    store.dedup_groups_in_bounds(tile.bounds_in(crs)).await
}

/// One published rollup in a district's history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub generation: u64,
    pub computed_at: DateTime<Utc>,
    pub total_count: u64,
    pub total_length_km: f64,
    pub source_version: String,
}

/// Time-ordered rollup history of one segment set
pub async fn trend(
    store: &dyn RefreshStore,
    district_id: DistrictId,
    segment_set: SegmentSet,
) -> Result<Vec<TrendPoint>> {
    let mut points: Vec<TrendPoint> = store
        .rollup_history(district_id)
        .await?
        .into_iter()
        .filter(|r| r.calculation_type == segment_set)
        .map(|r| TrendPoint {
            generation: r.generation,
            computed_at: r.computed_at,
            total_count: r.total_count,
            total_length_km: r.total_length_km,
            source_version: r.source_version,
        })
        .collect();
    points.sort_by_key(|p| p.generation);
    Ok(points)
}
