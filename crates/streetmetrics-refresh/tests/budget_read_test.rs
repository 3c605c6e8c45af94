//! Budget reads stay on one generation while refreshes publish around them

mod common;

use async_trait::async_trait;
use common::{harness, junction_network};
use geo::Rect;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use streetmetrics_core::config::RefreshSettings;
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{
    DedupGroup, District, DistrictId, NodeSummary, RawSegment, RefreshLogEntry, RollupRecord,
};
use streetmetrics_refresh::{budget_inputs, RefreshOrchestrator};
use streetmetrics_store::{
    DistrictStore, GenerationStore, GenerationTicket, MemoryRefreshStore, RefreshLogStore,
    RefreshStore,
};

/// Memory store that runs a refresh right after serving rollups
struct InterleavingStore {
    inner: MemoryRefreshStore,
    orchestrator: Arc<RefreshOrchestrator>,
    refreshes_left: AtomicUsize,
}

impl InterleavingStore {
    fn new(
        inner: MemoryRefreshStore,
        orchestrator: Arc<RefreshOrchestrator>,
        refreshes: usize,
    ) -> Self {
        Self { inner, orchestrator, refreshes_left: AtomicUsize::new(refreshes) }
    }
}

#[async_trait]
impl DistrictStore for InterleavingStore {
    async fn upsert_district(&self, district: &District) -> Result<()> {
        self.inner.upsert_district(district).await
    }

    async fn get_district(&self, id: DistrictId) -> Result<Option<District>> {
        self.inner.get_district(id).await
    }

    async fn list_districts(&self) -> Result<Vec<District>> {
        self.inner.list_districts().await
    }

    async fn list_active_districts(&self) -> Result<Vec<District>> {
        self.inner.list_active_districts().await
    }
}

#[async_trait]
impl GenerationStore for InterleavingStore {
    async fn begin_generation(&self, district_id: DistrictId) -> Result<GenerationTicket> {
        self.inner.begin_generation(district_id).await
    }

    async fn stage_segments(&self, ticket: &GenerationTicket, segments: &[RawSegment]) -> Result<()> {
        self.inner.stage_segments(ticket, segments).await
    }

    async fn stage_groups(&self, ticket: &GenerationTicket, groups: &[DedupGroup]) -> Result<()> {
        self.inner.stage_groups(ticket, groups).await
    }

    async fn stage_rollups(&self, ticket: &GenerationTicket, rollups: &[RollupRecord]) -> Result<()> {
        self.inner.stage_rollups(ticket, rollups).await
    }

    async fn stage_nodes(&self, ticket: &GenerationTicket, summary: &NodeSummary) -> Result<()> {
        self.inner.stage_nodes(ticket, summary).await
    }

    async fn publish_generation(&self, ticket: &GenerationTicket) -> Result<()> {
        self.inner.publish_generation(ticket).await
    }

    async fn discard_generation(&self, ticket: &GenerationTicket) -> Result<()> {
        self.inner.discard_generation(ticket).await
    }

    async fn published_generation(&self, district_id: DistrictId) -> Result<Option<u64>> {
        self.inner.published_generation(district_id).await
    }

    async fn raw_segments(&self, district_id: DistrictId) -> Result<Vec<RawSegment>> {
        self.inner.raw_segments(district_id).await
    }

    async fn dedup_groups(&self, district_id: DistrictId) -> Result<Vec<DedupGroup>> {
        self.inner.dedup_groups(district_id).await
    }

    async fn rollups(&self, district_id: DistrictId) -> Result<Vec<RollupRecord>> {
        let rollups = self.inner.rollups(district_id).await?;
        let pending = self
            .refreshes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if pending {
            self.orchestrator.refresh_district(district_id).await?;
        }
        Ok(rollups)
    }

    async fn node_summary(&self, district_id: DistrictId) -> Result<Option<NodeSummary>> {
        self.inner.node_summary(district_id).await
    }

    async fn dedup_groups_in_bounds(&self, bounds: Rect<f64>) -> Result<Vec<DedupGroup>> {
        self.inner.dedup_groups_in_bounds(bounds).await
    }

    async fn rollup_history(&self, district_id: DistrictId) -> Result<Vec<RollupRecord>> {
        self.inner.rollup_history(district_id).await
    }
}

#[async_trait]
impl RefreshLogStore for InterleavingStore {
    async fn append_log(&self, entry: &RefreshLogEntry) -> Result<u64> {
        self.inner.append_log(entry).await
    }

    async fn refresh_log(&self, district_id: Option<DistrictId>) -> Result<Vec<RefreshLogEntry>> {
        self.inner.refresh_log(district_id).await
    }
}

#[async_trait]
impl RefreshStore for InterleavingStore {
    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

#[tokio::test]
async fn test_budget_read_rereads_after_publish_in_between() {
    let h = harness(1, RefreshSettings::default()).await;
    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
    h.source.set_segments(DistrictId(1), junction_network(1));

    let store = InterleavingStore::new(h.store.clone(), h.orchestrator.clone(), 1);
    let inputs = budget_inputs(&store, DistrictId(1)).await.unwrap().unwrap();

    assert_eq!(inputs.generation, 2);
    assert_eq!(inputs.raw.generation, 2);
    assert_eq!(inputs.deduplicated.generation, 2);
    assert_eq!(inputs.raw.total_count, 6);
    assert_eq!(inputs.intersections, 2);
}

#[tokio::test]
async fn test_budget_read_gives_up_under_constant_publishing() {
    let h = harness(1, RefreshSettings::default()).await;
    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();

    let store = InterleavingStore::new(h.store.clone(), h.orchestrator.clone(), usize::MAX);
    let err = budget_inputs(&store, DistrictId(1)).await.unwrap_err();

    match err {
        StreetmetricsError::ConcurrentRefresh { id, expected, found } => {
            assert_eq!(id, DistrictId(1));
            assert_eq!(expected, Some(3));
            assert_eq!(found, Some(4));
        }
        other => panic!("expected a concurrent refresh error, got {}", other),
    }
}
