use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a district
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DistrictId(pub u64);

impl fmt::Display for DistrictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An administrative boundary over which metrics are computed.
///
/// Districts are created and updated by the boundary registry; the refresh
/// pipeline only ever reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: DistrictId,
    pub name: String,
    pub boundary: Option<MultiPolygon<f64>>,
    /// Precomputed surface area in square kilometers
    pub area_sq_km: Option<f64>,
    pub active: bool,
    pub source_version: String,
    pub updated_at: DateTime<Utc>,
}

impl District {
    pub fn new(id: DistrictId, name: impl Into<String>, boundary: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            id,
            name: name.into(),
            boundary: Some(boundary.into()),
            area_sq_km: None,
            active: true,
            source_version: "unversioned".to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_area(mut self, area_sq_km: f64) -> Self {
        self.area_sq_km = Some(area_sq_km);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.source_version = version.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Area usable as a density denominator.
    ///
    /// Zero, negative, non-finite or missing areas yield `None`.
    pub fn usable_area(&self) -> Option<f64> {
        self.area_sq_km.filter(|area| area.is_finite() && *area > 0.0)
    }
}
