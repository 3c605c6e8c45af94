//! Per-district refresh sequencing.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use streetmetrics_core::config::{NodeClassScope, RefreshSettings};
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{
    DedupGroup, District, DistrictId, NodeSummary, RawSegment, RefreshLogEntry, RefreshOperation,
    RoadClass, RollupRecord, SegmentSet,
};
use streetmetrics_core::ports::SegmentSource;
use streetmetrics_geo::validation::validate_boundary;
use streetmetrics_geo::{
    clip_segments, cluster_segments, estimate_group_nodes, estimate_nodes, NodeEstimate,
};
use streetmetrics_store::{GenerationTicket, RefreshStore};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::rollup::{aggregate_rollups, data_version};
use crate::state::RefreshState;

/// What one successful district refresh produced
#[derive(Debug, Clone, Serialize)]
pub struct DistrictReport {
    pub run_id: Uuid,
    pub district_id: DistrictId,
    pub generation: u64,
    pub source_version: String,
    pub raw_segments: usize,
    pub skipped_segments: usize,
    pub outside_segments: usize,
    pub groups: usize,
    pub merged_groups: usize,
    pub nodes: NodeSummary,
    pub rollups: Vec<RollupRecord>,
    pub elapsed_ms: u64,
}

/// Bookkeeping shared between a refresh and its failure handler
#[derive(Debug, Default)]
struct Progress {
    state: RefreshState,
    ticket: Option<GenerationTicket>,
    source_version: Option<String>,
}

/// Drives district refreshes against a store and an upstream source
pub struct RefreshOrchestrator {
    store: Arc<dyn RefreshStore>,
    source: Arc<dyn SegmentSource>,
    settings: RefreshSettings,
    locks: StdMutex<HashMap<DistrictId, Arc<Mutex<()>>>>,
}

impl RefreshOrchestrator {
    pub fn new(
        store: Arc<dyn RefreshStore>,
        source: Arc<dyn SegmentSource>,
        settings: RefreshSettings,
    ) -> Self {
        Self { store, source, settings, locks: StdMutex::new(HashMap::new()) }
    }

    pub fn store(&self) -> &Arc<dyn RefreshStore> {
        &self.store
    }

    pub fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    /// Mirror the upstream district registry into the store
    pub async fn sync_districts(&self) -> Result<usize> {
        let districts = self.source.list_districts().await?;
        for district in &districts {
            self.store.upsert_district(district).await?;
        }
        tracing::info!(count = districts.len(), "Synchronized districts from source");
        Ok(districts.len())
    }

    /// Refresh one district under a fresh run id
    pub async fn refresh_district(&self, district_id: DistrictId) -> Result<DistrictReport> {
        self.refresh_in_run(Uuid::new_v4(), district_id).await
    }

    /// Refresh one district as part of run `run_id`.
    ///
    /// Refreshes of the same district are serialized. On failure the staged
    /// generation is discarded, a `refresh_error` entry is logged and the
    /// previously published generation stays in place.
    pub async fn refresh_in_run(
        &self,
        run_id: Uuid,
        district_id: DistrictId,
    ) -> Result<DistrictReport> {
        let lock = self.district_lock(district_id);
        let _guard = lock.lock().await;

        let started = Instant::now();
        let mut progress = Progress::default();
        tracing::info!(district_id = %district_id, run_id = %run_id, "Refreshing district");

        let result = match self.settings.district_timeout {
            Some(limit) => {
                tokio::time::timeout(limit, self.run_steps(run_id, district_id, &mut progress))
                    .await
                    .unwrap_or_else(|_| {
                        Err(StreetmetricsError::Timeout { id: district_id, limit })
                    })
            }
            None => self.run_steps(run_id, district_id, &mut progress).await,
        };

        if let Err(err) = &result {
            self.handle_failure(run_id, district_id, progress, err, started.elapsed()).await;
        }
        result
    }

    fn district_lock(&self, district_id: DistrictId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(district_id).or_default().clone()
    }

    async fn load_district(&self, district_id: DistrictId) -> Result<District> {
        let district = self
            .store
            .get_district(district_id)
            .await?
            .ok_or(StreetmetricsError::DistrictNotFound { id: district_id })?;

        if !district.active {
            return Err(StreetmetricsError::DistrictInactive { id: district_id });
        }

        let boundary = district
            .boundary
            .as_ref()
            .ok_or(StreetmetricsError::MissingBoundary { id: district_id })?;
        let validation = validate_boundary(boundary);
        if !validation.is_valid {
            return Err(StreetmetricsError::InvalidGeometry {
                segment: format!("district {} boundary", district_id),
                reason: validation.first_reason(),
            });
        }

        Ok(district)
    }

    async fn run_steps(
        &self,
        run_id: Uuid,
        district_id: DistrictId,
        progress: &mut Progress,
    ) -> Result<DistrictReport> {
        let started = Instant::now();
        let district = self.load_district(district_id).await?;

        progress.state.advance(RefreshState::ClippingSegments)?;
        let step = Instant::now();
        let sources = self.source.fetch_segments(&district).await?;
        let clipped = clip_segments(
            &district,
            sources,
            &self.settings.cluster.crs,
            self.settings.cluster.validity,
        )?;
        let version = data_version(&district, &clipped.segments);
        progress.source_version = Some(version.clone());

        let ticket = self.store.begin_generation(district_id).await?;
        progress.ticket = Some(ticket.clone());
        self.store.stage_segments(&ticket, &clipped.segments).await?;
        self.record_step(
            run_id,
            district_id,
            RefreshOperation::ClipSegments,
            clipped.segments.len(),
            step.elapsed(),
            &version,
        )
        .await;

        progress.state.advance(RefreshState::Clustering)?;
        let step = Instant::now();
        let clustered = cluster_segments(district_id, &clipped.segments, &self.settings.cluster)?;
        self.store.stage_groups(&ticket, &clustered.groups).await?;
        self.record_step(
            run_id,
            district_id,
            RefreshOperation::ClusterSegments,
            clustered.groups.len(),
            step.elapsed(),
            &version,
        )
        .await;

        progress.state.advance(RefreshState::Aggregating)?;
        let step = Instant::now();
        let nodes = self.estimate_nodes(&clipped.segments, &clustered.groups)?.into_summary(
            district_id,
            self.settings.nodes.segment_set,
            self.settings.nodes.snap_precision,
            ticket.generation,
        );
        self.store.stage_nodes(&ticket, &nodes).await?;
        self.record_step(
            run_id,
            district_id,
            RefreshOperation::EstimateNodes,
            nodes.node_count as usize,
            step.elapsed(),
            &version,
        )
        .await;

        let step = Instant::now();
        let rollups =
            aggregate_rollups(&district, &clipped.segments, &clustered.groups, ticket.generation);
        self.store.stage_rollups(&ticket, &rollups).await?;
        self.record_step(
            run_id,
            district_id,
            RefreshOperation::AggregateRollups,
            rollups.len(),
            step.elapsed(),
            &version,
        )
        .await;

        self.store.publish_generation(&ticket).await?;
        progress.ticket = None;
        progress.state.advance(RefreshState::Complete)?;

        let elapsed = started.elapsed();
        let total_records = clipped.segments.len() + clustered.groups.len() + rollups.len();
        self.record_step(
            run_id,
            district_id,
            RefreshOperation::CompleteRefresh,
            total_records,
            elapsed,
            &version,
        )
        .await;

        tracing::info!(
            district_id = %district_id,
            run_id = %run_id,
            generation = ticket.generation,
            segments = clipped.segments.len(),
            groups = clustered.groups.len(),
            intersections = nodes.intersection_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "District refresh complete"
        );

        Ok(DistrictReport {
            run_id,
            district_id,
            generation: ticket.generation,
            source_version: version,
            raw_segments: clipped.segments.len(),
            skipped_segments: clipped.skipped + clustered.skipped,
            outside_segments: clipped.outside,
            groups: clustered.groups.len(),
            merged_groups: clustered.merged,
            nodes,
            rollups,
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    fn estimate_nodes(
        &self,
        segments: &[RawSegment],
        groups: &[DedupGroup],
    ) -> Result<NodeEstimate> {
        let precision = self.settings.nodes.snap_precision;
        let in_scope = |class: &RoadClass| match &self.settings.nodes.scope {
            NodeClassScope::All => true,
            NodeClassScope::Clustering => self.settings.cluster.includes(class),
            NodeClassScope::Classes(classes) => classes.contains(class),
        };

        match self.settings.nodes.segment_set {
            SegmentSet::Raw => estimate_nodes(
                segments.iter().filter(|s| in_scope(&s.class)).map(|s| &s.geometry),
                precision,
            ),
            SegmentSet::Deduplicated => {
                let scoped: Vec<DedupGroup> =
                    groups.iter().filter(|g| in_scope(&g.class)).cloned().collect();
                estimate_group_nodes(&scoped, segments, precision)
            }
        }
    }

    async fn handle_failure(
        &self,
        run_id: Uuid,
        district_id: DistrictId,
        mut progress: Progress,
        err: &StreetmetricsError,
        elapsed: Duration,
    ) {
        let stage = progress.state;
        if progress.state.fail().is_err() {
            tracing::debug!(state = %stage, "Refresh failed after reaching a terminal state");
        }

        if let Some(ticket) = progress.ticket.take() {
            if let Err(discard_err) = self.store.discard_generation(&ticket).await {
                tracing::warn!(
                    district_id = %district_id,
                    generation = ticket.generation,
                    error = %discard_err,
                    "Failed to discard staged generation"
                );
            }
        }

        if err.is_infrastructure() {
            tracing::error!(
                target: "streetmetrics::infra",
                district_id = %district_id,
                run_id = %run_id,
                stage = %stage,
                error = %err,
                "Store unavailable during refresh"
            );
        } else {
            tracing::warn!(
                district_id = %district_id,
                run_id = %run_id,
                stage = %stage,
                error = %err,
                "District refresh failed"
            );
        }

        let mut entry = RefreshLogEntry::failure(
            run_id,
            Some(district_id),
            RefreshOperation::RefreshError,
            format!("{}: {}", stage, err),
            elapsed,
        );
        if let Some(version) = progress.source_version {
            entry = entry.with_version(version);
        }
        self.record(entry).await;
    }

    async fn record_step(
        &self,
        run_id: Uuid,
        district_id: DistrictId,
        operation: RefreshOperation,
        records: usize,
        elapsed: Duration,
        version: &str,
    ) {
        let entry = RefreshLogEntry::success(run_id, district_id, operation, records, elapsed)
            .with_version(version);
        self.record(entry).await;
    }

    /// Append to the refresh log; failures are reported, never propagated
    pub(crate) async fn record(&self, entry: RefreshLogEntry) {
        if let Err(err) = self.store.append_log(&entry).await {
            tracing::warn!(
                operation = entry.operation.as_str(),
                district_id = ?entry.district_id,
                error = %err,
                "Failed to write refresh log entry"
            );
        }
    }
}
