//! Error types for StreetMetrics

use crate::models::DistrictId;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreetmetricsError {
    // Input errors
    #[error("District not found: {id}")]
    DistrictNotFound { id: DistrictId },

    #[error("District {id} is inactive")]
    DistrictInactive { id: DistrictId },

    #[error("District {id} has no boundary geometry")]
    MissingBoundary { id: DistrictId },

    #[error("Upstream source error: {0}")]
    Upstream(String),

    #[error("Invalid tile {z}/{x}/{y}")]
    InvalidTile { z: u8, x: u32, y: u32 },

    // Geometry errors
    #[error("Invalid geometry for segment {segment}: {reason}")]
    InvalidGeometry { segment: String, reason: String },

    // Compute errors
    #[error("{stage} failed: {reason}")]
    Compute { stage: String, reason: String },

    #[error("Refresh of district {id} exceeded its deadline of {limit:?}")]
    Timeout { id: DistrictId, limit: Duration },

    #[error(
        "District {id} was refreshed concurrently (expected generation {expected:?}, found {found:?})"
    )]
    ConcurrentRefresh {
        id: DistrictId,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("Invalid refresh transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // Log errors
    #[error("Failed to write refresh log: {0}")]
    LogWrite(String),

    // Infrastructure errors
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Config file not found at {path}")]
    ConfigNotFound { path: PathBuf },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification used to decide how far an error propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// District missing/inactive or upstream data unusable. Aborts one district.
    Input,
    /// Degenerate or invalid geometry.
    Geometry,
    /// Unexpected failure while clustering or aggregating.
    Compute,
    /// Refresh log could not be written. Best effort.
    Log,
    /// Store unreachable. Aborts the whole batch.
    Infrastructure,
    /// Bad configuration.
    Config,
}

impl StreetmetricsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DistrictNotFound { .. }
            | Self::DistrictInactive { .. }
            | Self::MissingBoundary { .. }
            | Self::Upstream(_)
            | Self::InvalidTile { .. } => ErrorKind::Input,
            Self::InvalidGeometry { .. } => ErrorKind::Geometry,
            Self::Compute { .. }
            | Self::Timeout { .. }
            | Self::ConcurrentRefresh { .. }
            | Self::InvalidTransition { .. }
            | Self::Serialization(_) => ErrorKind::Compute,
            Self::LogWrite(_) => ErrorKind::Log,
            Self::StoreUnavailable(_) => ErrorKind::Infrastructure,
            Self::ConfigMissing { .. }
            | Self::ConfigInvalid { .. }
            | Self::ConfigNotFound { .. }
            | Self::Io(_) => ErrorKind::Config,
        }
    }

    /// Whether this error should stop a batch instead of only the current district
    pub fn is_infrastructure(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }

    pub fn compute(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Compute { stage: stage.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, StreetmetricsError>;
