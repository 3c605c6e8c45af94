//! In-memory storage implementation for development and testing.
//!
//! This implementation uses `RwLock::unwrap()` intentionally. Lock poisoning
//! only occurs when another thread panicked while holding the lock, which is
//! an unrecoverable state. For production workloads, use the PostgreSQL backend.

use async_trait::async_trait;
use geo::{BoundingRect, Intersects, Rect};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{
    DedupGroup, District, DistrictId, NodeSummary, RawSegment, RefreshLogEntry, RollupRecord,
};

use crate::ports::{
    DistrictStore, GenerationStore, GenerationTicket, RefreshLogStore, RefreshStore,
};

/// Tables of one generation
#[derive(Debug, Clone, Default)]
struct GenerationData {
    segments: Vec<RawSegment>,
    groups: Vec<DedupGroup>,
    rollups: Vec<RollupRecord>,
    nodes: Option<NodeSummary>,
}

/// Published and staged generations of one district
#[derive(Debug, Clone, Default)]
struct DistrictTables {
    published: Option<u64>,
    last_generation: u64,
    generations: HashMap<u64, GenerationData>,
    history: Vec<RollupRecord>,
}

impl DistrictTables {
    fn published_data(&self) -> Option<&GenerationData> {
        self.published.and_then(|g| self.generations.get(&g))
    }
}

/// In-memory implementation of RefreshStore
#[derive(Debug, Clone, Default)]
pub struct MemoryRefreshStore {
    districts: Arc<RwLock<BTreeMap<DistrictId, District>>>,
    tables: Arc<RwLock<HashMap<DistrictId, DistrictTables>>>,
    log: Arc<RwLock<Vec<RefreshLogEntry>>>,
    unavailable: Arc<AtomicBool>,
    log_unavailable: Arc<AtomicBool>,
}

impl MemoryRefreshStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the backend: every call fails with `StoreUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Simulate a log sink that rejects writes while everything else works
    pub fn set_log_unavailable(&self, unavailable: bool) {
        self.log_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of generations held for a district, published or staged
    pub fn generation_count(&self, district_id: DistrictId) -> usize {
        let tables = self.tables.read().unwrap();
        tables.get(&district_id).map(|t| t.generations.len()).unwrap_or(0)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StreetmetricsError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    /// Run `f` on the staged data of `ticket`
    fn with_staged<F>(&self, ticket: &GenerationTicket, f: F) -> Result<()>
    where
        F: FnOnce(&mut GenerationData),
    {
        self.check_available()?;
        let mut tables = self.tables.write().unwrap();
        let staged = tables
            .get_mut(&ticket.district_id)
            .filter(|t| t.published != Some(ticket.generation))
            .and_then(|t| t.generations.get_mut(&ticket.generation))
            .ok_or_else(|| unknown_generation(ticket))?;
        f(staged);
        Ok(())
    }

    fn read_published<T, F>(&self, district_id: DistrictId, f: F) -> Result<T>
    where
        T: Default,
        F: FnOnce(&GenerationData) -> T,
    {
        self.check_available()?;
        let tables = self.tables.read().unwrap();
        Ok(tables.get(&district_id).and_then(|t| t.published_data()).map(f).unwrap_or_default())
    }
}

fn unknown_generation(ticket: &GenerationTicket) -> StreetmetricsError {
    StreetmetricsError::compute(
        "staging",
        format!(
            "generation {} of district {} is not staged",
            ticket.generation, ticket.district_id
        ),
    )
}

#[async_trait]
impl DistrictStore for MemoryRefreshStore {
    async fn upsert_district(&self, district: &District) -> Result<()> {
        self.check_available()?;
        let mut districts = self.districts.write().unwrap();
        districts.insert(district.id, district.clone());
        Ok(())
    }

    async fn get_district(&self, id: DistrictId) -> Result<Option<District>> {
        self.check_available()?;
        let districts = self.districts.read().unwrap();
        Ok(districts.get(&id).cloned())
    }

    async fn list_districts(&self) -> Result<Vec<District>> {
        self.check_available()?;
        let districts = self.districts.read().unwrap();
        Ok(districts.values().cloned().collect())
    }

    async fn list_active_districts(&self) -> Result<Vec<District>> {
        self.check_available()?;
        let districts = self.districts.read().unwrap();
        Ok(districts.values().filter(|d| d.active).cloned().collect())
    }
}

#[async_trait]
impl GenerationStore for MemoryRefreshStore {
    async fn begin_generation(&self, district_id: DistrictId) -> Result<GenerationTicket> {
        self.check_available()?;
        let mut tables = self.tables.write().unwrap();
        let district = tables.entry(district_id).or_default();

        district.last_generation += 1;
        let generation = district.last_generation;
        district.generations.insert(generation, GenerationData::default());

        Ok(GenerationTicket { district_id, generation, base: district.published })
    }

    async fn stage_segments(&self, ticket: &GenerationTicket, segments: &[RawSegment]) -> Result<()> {
        self.with_staged(ticket, |staged| staged.segments = segments.to_vec())
    }

    async fn stage_groups(&self, ticket: &GenerationTicket, groups: &[DedupGroup]) -> Result<()> {
        self.with_staged(ticket, |staged| staged.groups = groups.to_vec())
    }

    async fn stage_rollups(&self, ticket: &GenerationTicket, rollups: &[RollupRecord]) -> Result<()> {
        self.with_staged(ticket, |staged| {
            staged.rollups = rollups
                .iter()
                .cloned()
                .map(|mut r| {
                    r.generation = ticket.generation;
                    r
                })
                .collect();
        })
    }

    async fn stage_nodes(&self, ticket: &GenerationTicket, summary: &NodeSummary) -> Result<()> {
        self.with_staged(ticket, |staged| {
            let mut summary = summary.clone();
            summary.generation = ticket.generation;
            staged.nodes = Some(summary);
        })
    }

    async fn publish_generation(&self, ticket: &GenerationTicket) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.write().unwrap();
        let district =
            tables.get_mut(&ticket.district_id).ok_or_else(|| unknown_generation(ticket))?;

        if district.published != ticket.base {
            return Err(StreetmetricsError::ConcurrentRefresh {
                id: ticket.district_id,
                expected: ticket.base,
                found: district.published,
            });
        }
        if !district.generations.contains_key(&ticket.generation) {
            return Err(unknown_generation(ticket));
        }

        // Older generations are either the one being replaced or abandoned
        // stagings that can no longer publish
        district.published = Some(ticket.generation);
        district.generations.retain(|generation, _| *generation >= ticket.generation);
        let published = district.generations.get(&ticket.generation).cloned().unwrap_or_default();
        district.history.extend(published.rollups);

        Ok(())
    }

    async fn discard_generation(&self, ticket: &GenerationTicket) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.write().unwrap();
        if let Some(district) = tables.get_mut(&ticket.district_id) {
            if district.published != Some(ticket.generation) {
                district.generations.remove(&ticket.generation);
            }
        }
        Ok(())
    }

    async fn published_generation(&self, district_id: DistrictId) -> Result<Option<u64>> {
        self.check_available()?;
        let tables = self.tables.read().unwrap();
        Ok(tables.get(&district_id).and_then(|t| t.published))
    }

    async fn raw_segments(&self, district_id: DistrictId) -> Result<Vec<RawSegment>> {
        self.read_published(district_id, |data| data.segments.clone())
    }

    async fn dedup_groups(&self, district_id: DistrictId) -> Result<Vec<DedupGroup>> {
        self.read_published(district_id, |data| data.groups.clone())
    }

    async fn rollups(&self, district_id: DistrictId) -> Result<Vec<RollupRecord>> {
        self.read_published(district_id, |data| data.rollups.clone())
    }

    async fn node_summary(&self, district_id: DistrictId) -> Result<Option<NodeSummary>> {
        self.read_published(district_id, |data| data.nodes.clone())
    }

    async fn dedup_groups_in_bounds(&self, bounds: Rect<f64>) -> Result<Vec<DedupGroup>> {
        self.check_available()?;
        let tables = self.tables.read().unwrap();

        let mut district_ids: Vec<&DistrictId> = tables.keys().collect();
        district_ids.sort();

        Ok(district_ids
            .into_iter()
            .filter_map(|id| tables.get(id).and_then(|t| t.published_data()))
            .flat_map(|data| data.groups.iter())
            .filter(|group| {
                group.geometry.bounding_rect().is_some_and(|rect| rect.intersects(&bounds))
            })
            .cloned()
            .collect())
    }

    async fn rollup_history(&self, district_id: DistrictId) -> Result<Vec<RollupRecord>> {
        self.check_available()?;
        let tables = self.tables.read().unwrap();
        Ok(tables.get(&district_id).map(|t| t.history.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl RefreshLogStore for MemoryRefreshStore {
    async fn append_log(&self, entry: &RefreshLogEntry) -> Result<u64> {
        self.check_available()?;
        if self.log_unavailable.load(Ordering::SeqCst) {
            return Err(StreetmetricsError::LogWrite("refresh log rejected the write".to_string()));
        }

        let mut log = self.log.write().unwrap();
        let id = log.len() as u64 + 1;
        let mut entry = entry.clone();
        entry.id = id;
        log.push(entry);
        Ok(id)
    }

    async fn refresh_log(&self, district_id: Option<DistrictId>) -> Result<Vec<RefreshLogEntry>> {
        self.check_available()?;
        let log = self.log.read().unwrap();
        Ok(log
            .iter()
            .filter(|entry| district_id.is_none() || entry.district_id == district_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RefreshStore for MemoryRefreshStore {
    async fn health_check(&self) -> Result<()> {
        self.check_available()
    }
}
