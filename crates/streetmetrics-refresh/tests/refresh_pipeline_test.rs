//! Integration tests for single-district refreshes
//!
//! Runs the orchestrator end to end against the in-memory store: clipping,
//! clustering, node estimation, aggregation, publish and the refresh log.

mod common;

use chrono::Utc;
use common::{
    collapsed_major_road, district, harness, junction_network, street_network, FixtureSource,
};
use std::sync::Arc;
use std::time::Duration;
use streetmetrics_core::config::{NodeClassScope, RefreshSettings};
use streetmetrics_core::error::StreetmetricsError;
use streetmetrics_core::models::{
    Crs, DistrictId, RefreshOperation, SegmentSet, ValidityMode, ERROR_SENTINEL,
};
use streetmetrics_geo::TileCoord;
use streetmetrics_refresh::{budget_inputs, freshness, groups_in_tile, trend, RefreshOrchestrator};
use streetmetrics_store::{DistrictStore, GenerationStore, MemoryRefreshStore, RefreshLogStore};

fn strict_settings() -> RefreshSettings {
    let mut settings = RefreshSettings::default();
    settings.cluster.validity = ValidityMode::Strict;
    settings
}

#[tokio::test]
async fn test_refresh_publishes_raw_and_deduplicated_rollups() {
    let h = harness(1, RefreshSettings::default()).await;

    let report = h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
    assert_eq!(report.raw_segments, 4);
    assert_eq!(report.groups, 3);
    assert_eq!(report.merged_groups, 1);
    assert_eq!(report.outside_segments, 0);
    assert_eq!(report.generation, 1);

    let rollups = h.store.rollups(DistrictId(1)).await.unwrap();
    let raw = rollups.iter().find(|r| r.calculation_type == SegmentSet::Raw).unwrap();
    let dedup = rollups.iter().find(|r| r.calculation_type == SegmentSet::Deduplicated).unwrap();
    assert_eq!(raw.total_count, 4);
    assert_eq!(dedup.total_count, 3);
    assert!((raw.total_length_m - dedup.total_length_m).abs() < 1e-6);
    assert!(raw.count_density.is_some());

    let groups = h.store.dedup_groups(DistrictId(1)).await.unwrap();
    let boulevard = groups.iter().find(|g| g.deduplicated).unwrap();
    assert_eq!(boulevard.member_count, 2);
    assert_eq!(boulevard.name.as_deref(), Some("Main Boulevard"));

    let inputs = budget_inputs(&h.store, DistrictId(1)).await.unwrap().unwrap();
    assert_eq!(inputs.generation, 1);
    assert_eq!(inputs.raw.total_count, 4);
    assert_eq!(inputs.deduplicated.total_count, 3);
    assert_eq!(inputs.intersections, 0);
}

#[tokio::test]
async fn test_intersections_follow_node_scope_and_segment_set() {
    let cases = [
        (NodeClassScope::All, SegmentSet::Raw, 2),
        (NodeClassScope::Clustering, SegmentSet::Raw, 1),
        (NodeClassScope::All, SegmentSet::Deduplicated, 1),
        (NodeClassScope::Clustering, SegmentSet::Deduplicated, 0),
    ];

    for (scope, segment_set, expected) in cases {
        let mut settings = RefreshSettings::default();
        settings.nodes.scope = scope.clone();
        settings.nodes.segment_set = segment_set;
        let h = harness(1, settings).await;
        h.source.set_segments(DistrictId(1), junction_network(1));

        let report = h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
        assert_eq!(report.raw_segments, 6);
        assert_eq!(report.merged_groups, 1);

        let summary = h.store.node_summary(DistrictId(1)).await.unwrap().unwrap();
        assert_eq!(summary.segment_set, segment_set);
        assert_eq!(
            summary.intersection_count, expected,
            "scope {:?} over {:?}",
            scope, segment_set
        );

        let inputs = budget_inputs(&h.store, DistrictId(1)).await.unwrap().unwrap();
        assert_eq!(inputs.intersections, expected);
        assert_eq!(inputs.generation, summary.generation);
    }
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let h = harness(1, RefreshSettings::default()).await;

    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
    let first = h.store.rollups(DistrictId(1)).await.unwrap();
    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
    let second = h.store.rollups(DistrictId(1)).await.unwrap();

    assert_eq!(first.len(), 2);
    for (a, b) in first.iter().zip(&second) {
        assert!(a.same_totals(b), "totals changed between identical refreshes");
        assert_eq!(b.generation, a.generation + 1);
    }
    assert_eq!(h.store.rollup_history(DistrictId(1)).await.unwrap().len(), 4);
    assert_eq!(h.store.generation_count(DistrictId(1)), 1);
}

#[tokio::test]
async fn test_every_step_is_logged() {
    let h = harness(1, RefreshSettings::default()).await;
    let report = h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();

    let log = h.store.refresh_log(Some(DistrictId(1))).await.unwrap();
    let operations: Vec<RefreshOperation> = log.iter().map(|e| e.operation).collect();
    assert_eq!(
        operations,
        vec![
            RefreshOperation::ClipSegments,
            RefreshOperation::ClusterSegments,
            RefreshOperation::EstimateNodes,
            RefreshOperation::AggregateRollups,
            RefreshOperation::CompleteRefresh,
        ]
    );
    assert!(log.iter().all(|e| e.success && e.run_id == report.run_id));
    assert!(log.iter().all(|e| e.source_version.as_deref() == Some("2024-06")));

    let complete = log.last().unwrap();
    assert_eq!(complete.records_processed, 4 + 3 + 2);
}

#[tokio::test]
async fn test_zero_area_yields_null_densities() {
    let h = harness(0, RefreshSettings::default()).await;
    let mut flat = district(1);
    flat.area_sq_km = Some(0.0);
    h.store.upsert_district(&flat).await.unwrap();
    h.source.add_district(flat, street_network(1));

    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();

    for rollup in h.store.rollups(DistrictId(1)).await.unwrap() {
        assert!(rollup.count_density.is_none());
        assert!(rollup.length_density.is_none());
        let json = serde_json::to_value(&rollup).unwrap();
        assert!(json["length_density"].is_null());
    }
}

#[tokio::test]
async fn test_missing_district_logs_error_sentinel() {
    let h = harness(1, RefreshSettings::default()).await;

    let err = h.orchestrator.refresh_district(DistrictId(99)).await.unwrap_err();
    assert!(matches!(err, StreetmetricsError::DistrictNotFound { id: DistrictId(99) }));

    let log = h.store.refresh_log(Some(DistrictId(99))).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].operation, RefreshOperation::RefreshError);
    assert_eq!(log[0].records_processed, ERROR_SENTINEL);
    assert!(!log[0].success);
    assert!(log[0].error.as_deref().unwrap().starts_with("pending"));
}

#[tokio::test]
async fn test_inactive_and_boundaryless_districts_are_rejected() {
    let h = harness(2, RefreshSettings::default()).await;

    h.store.upsert_district(&district(1).inactive()).await.unwrap();
    let err = h.orchestrator.refresh_district(DistrictId(1)).await.unwrap_err();
    assert!(matches!(err, StreetmetricsError::DistrictInactive { .. }));

    let mut no_boundary = district(2);
    no_boundary.boundary = None;
    h.store.upsert_district(&no_boundary).await.unwrap();
    let err = h.orchestrator.refresh_district(DistrictId(2)).await.unwrap_err();
    assert!(matches!(err, StreetmetricsError::MissingBoundary { .. }));

    assert_eq!(h.store.published_generation(DistrictId(1)).await.unwrap(), None);
    assert_eq!(h.store.published_generation(DistrictId(2)).await.unwrap(), None);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_generation() {
    let h = harness(1, strict_settings()).await;
    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
    let before = h.store.rollups(DistrictId(1)).await.unwrap();

    let mut broken = street_network(1);
    broken.push(collapsed_major_road(1));
    h.source.set_segments(DistrictId(1), broken);

    let err = h.orchestrator.refresh_district(DistrictId(1)).await.unwrap_err();
    assert!(matches!(err, StreetmetricsError::InvalidGeometry { .. }));

    let after = h.store.rollups(DistrictId(1)).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(h.store.published_generation(DistrictId(1)).await.unwrap(), Some(1));
    assert_eq!(h.store.generation_count(DistrictId(1)), 1);

    let log = h.store.refresh_log(Some(DistrictId(1))).await.unwrap();
    let error = log.last().unwrap();
    assert_eq!(error.operation, RefreshOperation::RefreshError);
    assert!(error.error.as_deref().unwrap().starts_with("clustering"));
}

#[tokio::test]
async fn test_lenient_mode_skips_collapsed_segments() {
    let h = harness(1, RefreshSettings::default()).await;
    let mut noisy = street_network(1);
    noisy.push(collapsed_major_road(1));
    h.source.set_segments(DistrictId(1), noisy);

    let report = h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
    assert_eq!(report.skipped_segments, 1);
    assert_eq!(report.groups, 3);
}

#[tokio::test]
async fn test_timeout_fails_district_without_publishing() {
    let mut settings = RefreshSettings::default();
    settings.district_timeout = Some(Duration::from_millis(50));
    let h = harness(1, settings).await;
    h.source.slow_down(DistrictId(1), Duration::from_millis(500));

    let err = h.orchestrator.refresh_district(DistrictId(1)).await.unwrap_err();
    assert!(matches!(err, StreetmetricsError::Timeout { id: DistrictId(1), .. }));
    assert!(err.to_string().ends_with("deadline of 50ms"), "got {}", err);
    assert_eq!(h.store.published_generation(DistrictId(1)).await.unwrap(), None);

    let log = h.store.refresh_log(Some(DistrictId(1))).await.unwrap();
    assert_eq!(log.last().unwrap().operation, RefreshOperation::RefreshError);
}

#[tokio::test]
async fn test_log_failures_do_not_roll_back_published_work() {
    let h = harness(1, RefreshSettings::default()).await;
    h.store.set_log_unavailable(true);

    let report = h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
    assert_eq!(report.generation, 1);
    assert_eq!(h.store.rollups(DistrictId(1)).await.unwrap().len(), 2);
    assert!(h.store.refresh_log(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_same_district_refreshes_are_serialized() {
    let h = harness(1, RefreshSettings::default()).await;

    let (a, b) = tokio::join!(
        h.orchestrator.refresh_district(DistrictId(1)),
        h.orchestrator.refresh_district(DistrictId(1)),
    );
    let mut generations = vec![a.unwrap().generation, b.unwrap().generation];
    generations.sort();

    assert_eq!(generations, vec![1, 2]);
    assert_eq!(h.store.published_generation(DistrictId(1)).await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_freshness_and_trend() {
    let h = harness(1, RefreshSettings::default()).await;
    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();

    let fresh = freshness(&h.store, DistrictId(1), Utc::now()).await.unwrap();
    assert!(fresh.last_success.is_some());
    assert!(fresh.age_secs.unwrap() >= 0);
    assert!(fresh.last_error.is_none());
    assert!(!fresh.is_stale(3600));

    h.store.upsert_district(&district(1).inactive()).await.unwrap();
    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap_err();
    let stale = freshness(&h.store, DistrictId(1), Utc::now()).await.unwrap();
    assert_eq!(stale.last_success, fresh.last_success);
    assert!(stale.last_error.is_some());

    let points = trend(&h.store, DistrictId(1), SegmentSet::Deduplicated).await.unwrap();
    let generations: Vec<u64> = points.iter().map(|p| p.generation).collect();
    assert_eq!(generations, vec![1, 2]);
    assert!(points.iter().all(|p| p.total_count == 3));

    let never = freshness(&h.store, DistrictId(42), Utc::now()).await.unwrap();
    assert!(never.last_success.is_none());
    assert!(never.is_stale(3600));
}

#[tokio::test]
async fn test_groups_in_tile() {
    let h = harness(2, RefreshSettings::default()).await;
    h.orchestrator.refresh_district(DistrictId(1)).await.unwrap();
    h.orchestrator.refresh_district(DistrictId(2)).await.unwrap();

    let tile = TileCoord::containing(0.105, 0.005, 14).unwrap();
    let groups = groups_in_tile(&h.store, tile, &Crs::wgs84()).await.unwrap();
    assert!(!groups.is_empty());
    assert!(groups.iter().all(|g| g.district_id == DistrictId(1)));
}

#[tokio::test]
async fn test_sync_districts_from_source() {
    let store = MemoryRefreshStore::new();
    let source = Arc::new(FixtureSource::default());
    source.add_district(district(2), street_network(2));
    source.add_district(district(1).inactive(), street_network(1));

    let orchestrator = RefreshOrchestrator::new(Arc::new(store.clone()), source, Default::default());
    assert_eq!(orchestrator.sync_districts().await.unwrap(), 2);

    assert_eq!(store.list_districts().await.unwrap().len(), 2);
    let active = store.list_active_districts().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, DistrictId(2));
}
