use async_trait::async_trait;
use geo::Rect;
use serde::{Deserialize, Serialize};
use streetmetrics_core::error::Result;
use streetmetrics_core::models::{
    DedupGroup, District, DistrictId, NodeSummary, RawSegment, RefreshLogEntry, RollupRecord,
};

/// Handle to a staged, not yet published generation of one district
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTicket {
    pub district_id: DistrictId,
    pub generation: u64,
    /// Generation that was published when staging began
    pub base: Option<u64>,
}

/// Port for the district registry mirror
#[async_trait]
pub trait DistrictStore: Send + Sync {
    /// Insert or replace a district
    async fn upsert_district(&self, district: &District) -> Result<()>;

    /// Retrieve a district by ID
    async fn get_district(&self, id: DistrictId) -> Result<Option<District>>;

    /// All districts, ordered by ID
    async fn list_districts(&self) -> Result<Vec<District>>;

    /// Active districts, ordered by ID
    async fn list_active_districts(&self) -> Result<Vec<District>>;
}

/// Port for generation-staged refresh output.
///
/// Staging calls replace the staged content of their table wholesale. Reads
/// only ever return the published generation.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Open a new staged generation for a district
    async fn begin_generation(&self, district_id: DistrictId) -> Result<GenerationTicket>;

    async fn stage_segments(&self, ticket: &GenerationTicket, segments: &[RawSegment]) -> Result<()>;

    async fn stage_groups(&self, ticket: &GenerationTicket, groups: &[DedupGroup]) -> Result<()>;

    async fn stage_rollups(&self, ticket: &GenerationTicket, rollups: &[RollupRecord]) -> Result<()>;

    async fn stage_nodes(&self, ticket: &GenerationTicket, summary: &NodeSummary) -> Result<()>;

    /// Make the staged generation visible to readers.
    ///
    /// Fails with `ConcurrentRefresh` if another generation was published
    /// after `ticket` was issued; the staged data is left for the caller to
    /// discard.
    async fn publish_generation(&self, ticket: &GenerationTicket) -> Result<()>;

    /// Drop a staged generation. Unknown tickets are ignored.
    async fn discard_generation(&self, ticket: &GenerationTicket) -> Result<()>;

    /// Currently published generation, if any
    async fn published_generation(&self, district_id: DistrictId) -> Result<Option<u64>>;

    async fn raw_segments(&self, district_id: DistrictId) -> Result<Vec<RawSegment>>;

    async fn dedup_groups(&self, district_id: DistrictId) -> Result<Vec<DedupGroup>>;

    /// Raw and deduplicated rollups of the published generation
    async fn rollups(&self, district_id: DistrictId) -> Result<Vec<RollupRecord>>;

    async fn node_summary(&self, district_id: DistrictId) -> Result<Option<NodeSummary>>;

    /// Published groups of every district whose envelope overlaps `bounds`
    async fn dedup_groups_in_bounds(&self, bounds: Rect<f64>) -> Result<Vec<DedupGroup>>;

    /// Rollups of every generation ever published, oldest first
    async fn rollup_history(&self, district_id: DistrictId) -> Result<Vec<RollupRecord>>;
}

/// Port for the append-only refresh log
#[async_trait]
pub trait RefreshLogStore: Send + Sync {
    /// Append an entry and return its assigned ID
    async fn append_log(&self, entry: &RefreshLogEntry) -> Result<u64>;

    /// Entries in append order, optionally restricted to one district
    async fn refresh_log(&self, district_id: Option<DistrictId>) -> Result<Vec<RefreshLogEntry>>;
}

/// Everything the refresh pipeline needs from storage
#[async_trait]
pub trait RefreshStore: DistrictStore + GenerationStore + RefreshLogStore {
    /// Fails with `StoreUnavailable` when the backend cannot be reached
    async fn health_check(&self) -> Result<()>;
}
