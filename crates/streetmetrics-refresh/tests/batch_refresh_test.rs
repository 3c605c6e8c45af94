//! Integration tests for batch refreshes
//!
//! A failing district must never disturb its neighbours, while a store
//! outage must stop the whole batch.

mod common;

use common::{collapsed_major_road, district, harness, street_network};
use std::time::Duration;
use streetmetrics_core::config::RefreshSettings;
use streetmetrics_core::error::StreetmetricsError;
use streetmetrics_core::models::{DistrictId, RefreshOperation, ValidityMode, ERROR_SENTINEL};
use streetmetrics_store::{DistrictStore, GenerationStore, RefreshLogStore};

fn strict_settings() -> RefreshSettings {
    let mut settings = RefreshSettings::default();
    settings.cluster.validity = ValidityMode::Strict;
    settings
}

#[tokio::test]
async fn test_failing_district_does_not_affect_others() {
    let h = harness(5, strict_settings()).await;

    let first = h.orchestrator.refresh_all().await.unwrap();
    assert_eq!(first.success_count(), 5);
    let before = h.store.rollups(DistrictId(3)).await.unwrap();

    let mut broken = street_network(3);
    broken.push(collapsed_major_road(3));
    h.source.set_segments(DistrictId(3), broken);

    let second = h.orchestrator.refresh_all().await.unwrap();
    assert_eq!(second.total, 5);
    assert_eq!(second.success_count(), 4);
    assert_eq!(second.failure_count(), 1);

    let (failed_id, err) = &second.failed[0];
    assert_eq!(*failed_id, DistrictId(3));
    assert!(matches!(err, StreetmetricsError::InvalidGeometry { .. }));

    let succeeded: Vec<DistrictId> = second.succeeded.iter().map(|r| r.district_id).collect();
    assert_eq!(succeeded, vec![DistrictId(1), DistrictId(2), DistrictId(4), DistrictId(5)]);

    // District 3 keeps serving the rollup of the first run
    assert_eq!(h.store.rollups(DistrictId(3)).await.unwrap(), before);
    for id in [1, 2, 4, 5] {
        assert_eq!(h.store.published_generation(DistrictId(id)).await.unwrap(), Some(2));
    }

    let errors: Vec<_> = h
        .store
        .refresh_log(Some(DistrictId(3)))
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.operation == RefreshOperation::RefreshError)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].records_processed, ERROR_SENTINEL);
    assert_eq!(errors[0].run_id, second.run_id);
}

#[tokio::test]
async fn test_inactive_districts_are_not_queued() {
    let h = harness(3, RefreshSettings::default()).await;
    h.store.upsert_district(&district(2).inactive()).await.unwrap();

    let summary = h.orchestrator.refresh_all().await.unwrap();
    assert_eq!(summary.total, 2);
    assert!(summary.all_succeeded());
    assert_eq!(h.store.published_generation(DistrictId(2)).await.unwrap(), None);
}

#[tokio::test]
async fn test_panicking_district_is_isolated() {
    let h = harness(3, RefreshSettings::default()).await;
    h.source.panic_on(DistrictId(2));

    let summary = h.orchestrator.refresh_all().await.unwrap();
    assert_eq!(summary.success_count(), 2);

    let (failed_id, err) = &summary.failed[0];
    assert_eq!(*failed_id, DistrictId(2));
    assert!(matches!(err, StreetmetricsError::Compute { .. }));
    assert!(err.to_string().contains("fixture source exploded"));

    let log = h.store.refresh_log(Some(DistrictId(2))).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].operation, RefreshOperation::RefreshError);
}

#[tokio::test]
async fn test_slow_district_times_out_alone() {
    let mut settings = RefreshSettings::default();
    settings.district_timeout = Some(Duration::from_millis(100));
    let h = harness(3, settings).await;
    h.source.slow_down(DistrictId(1), Duration::from_secs(2));

    let summary = h.orchestrator.refresh_all().await.unwrap();
    assert_eq!(summary.success_count(), 2);
    assert!(matches!(summary.failed[0].1, StreetmetricsError::Timeout { id: DistrictId(1), .. }));
}

#[tokio::test]
async fn test_store_outage_aborts_batch() {
    let mut settings = RefreshSettings::default();
    settings.workers = 1;
    let h = harness(5, settings).await;
    h.source.outage_on(DistrictId(3), h.store.clone());

    let err = h.orchestrator.refresh_all().await.unwrap_err();
    assert!(matches!(err, StreetmetricsError::StoreUnavailable(_)));
    assert!(err.is_infrastructure());

    h.store.set_unavailable(false);
    assert_eq!(h.store.published_generation(DistrictId(1)).await.unwrap(), Some(1));
    assert_eq!(h.store.published_generation(DistrictId(2)).await.unwrap(), Some(1));
    for id in [3, 4, 5] {
        assert_eq!(h.store.published_generation(DistrictId(id)).await.unwrap(), None);
    }

    // Nothing after the outage was started
    let log = h.store.refresh_log(None).await.unwrap();
    assert!(log.iter().all(|e| e.district_id != Some(DistrictId(4))));
    assert!(log.iter().all(|e| e.district_id != Some(DistrictId(5))));
}
