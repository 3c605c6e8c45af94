//! Shared fixtures for refresh pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use geo::{line_string, polygon, LineString};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use streetmetrics_core::config::RefreshSettings;
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{District, DistrictId, RoadClass, SourceSegment};
use streetmetrics_core::ports::SegmentSource;
use streetmetrics_refresh::RefreshOrchestrator;
use streetmetrics_store::{DistrictStore, MemoryRefreshStore};

/// In-memory upstream source with switches for failure scenarios
#[derive(Default)]
pub struct FixtureSource {
    districts: RwLock<Vec<District>>,
    segments: RwLock<HashMap<DistrictId, Vec<SourceSegment>>>,
    slow: RwLock<HashMap<DistrictId, Duration>>,
    panics: RwLock<HashSet<DistrictId>>,
    outage: RwLock<Option<(DistrictId, MemoryRefreshStore)>>,
}

impl FixtureSource {
    pub fn add_district(&self, district: District, segments: Vec<SourceSegment>) {
        self.segments.write().unwrap().insert(district.id, segments);
        self.districts.write().unwrap().push(district);
    }

    pub fn set_segments(&self, district_id: DistrictId, segments: Vec<SourceSegment>) {
        self.segments.write().unwrap().insert(district_id, segments);
    }

    pub fn slow_down(&self, district_id: DistrictId, delay: Duration) {
        self.slow.write().unwrap().insert(district_id, delay);
    }

    pub fn panic_on(&self, district_id: DistrictId) {
        self.panics.write().unwrap().insert(district_id);
    }

    /// Take the store offline when `district_id` is fetched
    pub fn outage_on(&self, district_id: DistrictId, store: MemoryRefreshStore) {
        *self.outage.write().unwrap() = Some((district_id, store));
    }
}

#[async_trait]
impl SegmentSource for FixtureSource {
    async fn list_districts(&self) -> Result<Vec<District>> {
        Ok(self.districts.read().unwrap().clone())
    }

    async fn fetch_segments(&self, district: &District) -> Result<Vec<SourceSegment>> {
        let delay = self.slow.read().unwrap().get(&district.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics.read().unwrap().contains(&district.id) {
            panic!("fixture source exploded for district {}", district.id);
        }
        if let Some((id, store)) = self.outage.read().unwrap().as_ref() {
            if *id == district.id {
                store.set_unavailable(true);
            }
        }

        self.segments
            .read()
            .unwrap()
            .get(&district.id)
            .cloned()
            .ok_or_else(|| StreetmetricsError::Upstream(format!("no segments for {}", district.id)))
    }
}

/// District `n`: a 0.01 degree square at longitude `n / 10`
pub fn district(n: u64) -> District {
    let x = n as f64 / 10.0;
    District::new(
        DistrictId(n),
        format!("District {}", n),
        polygon![
            (x: x, y: 0.0),
            (x: x + 0.01, y: 0.0),
            (x: x + 0.01, y: 0.01),
            (x: x, y: 0.01),
        ],
    )
    .with_area(1.23)
    .with_version("2024-06")
}

pub fn source(
    feature_id: &str,
    class: &str,
    name: Option<&str>,
    geometry: LineString<f64>,
) -> SourceSegment {
    SourceSegment {
        feature_id: feature_id.to_string(),
        class: RoadClass::new(class),
        subclass: None,
        name: name.map(str::to_string),
        geometry,
        length_m: None,
        source_version: "2024-06".to_string(),
    }
}

/// A divided boulevard (two carriageways ~10 m apart), a cross street and
/// a residential spur, all inside district `n`.
pub fn street_network(n: u64) -> Vec<SourceSegment> {
    let x = n as f64 / 10.0;
    vec![
        source(
            "a-north",
            "primary",
            Some("Main Boulevard"),
            line_string![(x: x + 0.001, y: 0.00500), (x: x + 0.009, y: 0.00500)],
        ),
        source(
            "a-south",
            "primary",
            Some("Main Boulevard"),
            line_string![(x: x + 0.001, y: 0.00509), (x: x + 0.009, y: 0.00509)],
        ),
        source(
            "b-cross",
            "secondary",
            Some("Cross Street"),
            line_string![(x: x + 0.005, y: 0.001), (x: x + 0.005, y: 0.004)],
        ),
        source(
            "c-spur",
            "residential",
            None,
            line_string![(x: x + 0.002, y: 0.007), (x: x + 0.002, y: 0.009)],
        ),
    ]
}

/// Two junctions inside district `n`.
///
/// A cross street, a dock lane and a residential spur meet at one vertex.
/// Two converging Harbor Road carriageways end where the Quay Street begins.
pub fn junction_network(n: u64) -> Vec<SourceSegment> {
    let x = n as f64 / 10.0;
    let junction = (x + 0.005, 0.004);
    let merge = (x + 0.009, 0.0075);
    vec![
        source(
            "b-cross",
            "secondary",
            Some("Cross Street"),
            line_string![(x: x + 0.005, y: 0.001), (x: junction.0, y: junction.1)],
        ),
        source(
            "d-dock",
            "tertiary",
            Some("Dock Lane"),
            line_string![(x: junction.0, y: junction.1), (x: x + 0.008, y: 0.004)],
        ),
        source(
            "c-spur",
            "residential",
            None,
            line_string![(x: junction.0, y: junction.1), (x: x + 0.003, y: 0.004)],
        ),
        source(
            "e-north",
            "primary",
            Some("Harbor Road"),
            line_string![(x: x + 0.002, y: 0.00755), (x: merge.0, y: merge.1)],
        ),
        source(
            "e-south",
            "primary",
            Some("Harbor Road"),
            line_string![(x: x + 0.002, y: 0.00745), (x: merge.0, y: merge.1)],
        ),
        source(
            "f-quay",
            "secondary",
            Some("Quay Street"),
            line_string![(x: merge.0, y: merge.1), (x: x + 0.009, y: 0.0095)],
        ),
    ]
}

/// A primary road collapsed to a single repeated vertex
pub fn collapsed_major_road(n: u64) -> SourceSegment {
    let x = n as f64 / 10.0 + 0.003;
    source("z-collapsed", "primary", None, line_string![(x: x, y: 0.003), (x: x, y: 0.003)])
}

pub struct Harness {
    pub store: MemoryRefreshStore,
    pub source: Arc<FixtureSource>,
    pub orchestrator: Arc<RefreshOrchestrator>,
}

/// Orchestrator over a memory store with districts `1..=count` registered
pub async fn harness(count: u64, settings: RefreshSettings) -> Harness {
    let store = MemoryRefreshStore::new();
    let source = Arc::new(FixtureSource::default());
    for n in 1..=count {
        let district = district(n);
        store.upsert_district(&district).await.unwrap();
        source.add_district(district, street_network(n));
    }

    let orchestrator = Arc::new(RefreshOrchestrator::new(
        Arc::new(store.clone()),
        source.clone(),
        settings,
    ));
    Harness { store, source, orchestrator }
}
