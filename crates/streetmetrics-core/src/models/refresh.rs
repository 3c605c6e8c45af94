use crate::models::DistrictId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// `records_processed` value written for failed refreshes
pub const ERROR_SENTINEL: i64 = -1;

/// Pipeline operation recorded in the refresh log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOperation {
    ClipSegments,
    ClusterSegments,
    EstimateNodes,
    AggregateRollups,
    CompleteRefresh,
    RefreshError,
    BatchAborted,
}

impl RefreshOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOperation::ClipSegments => "clip_segments",
            RefreshOperation::ClusterSegments => "cluster_segments",
            RefreshOperation::EstimateNodes => "estimate_nodes",
            RefreshOperation::AggregateRollups => "aggregate_rollups",
            RefreshOperation::CompleteRefresh => "complete_refresh",
            RefreshOperation::RefreshError => "refresh_error",
            RefreshOperation::BatchAborted => "batch_aborted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clip_segments" => Some(RefreshOperation::ClipSegments),
            "cluster_segments" => Some(RefreshOperation::ClusterSegments),
            "estimate_nodes" => Some(RefreshOperation::EstimateNodes),
            "aggregate_rollups" => Some(RefreshOperation::AggregateRollups),
            "complete_refresh" => Some(RefreshOperation::CompleteRefresh),
            "refresh_error" => Some(RefreshOperation::RefreshError),
            "batch_aborted" => Some(RefreshOperation::BatchAborted),
            _ => None,
        }
    }
}

impl fmt::Display for RefreshOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one pipeline operation.
///
/// `id` is assigned by the store on append; entries are never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshLogEntry {
    pub id: u64,
    pub run_id: Uuid,
    pub district_id: Option<DistrictId>,
    pub operation: RefreshOperation,
    pub records_processed: i64,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub source_version: Option<String>,
    pub logged_at: DateTime<Utc>,
}

impl RefreshLogEntry {
    pub fn success(
        run_id: Uuid,
        district_id: DistrictId,
        operation: RefreshOperation,
        records_processed: usize,
        duration: Duration,
    ) -> Self {
        Self {
            id: 0,
            run_id,
            district_id: Some(district_id),
            operation,
            records_processed: records_processed as i64,
            duration_ms: duration.as_millis() as u64,
            success: true,
            error: None,
            source_version: None,
            logged_at: Utc::now(),
        }
    }

    /// A `refresh_error` entry carrying the sentinel record count
    pub fn failure(
        run_id: Uuid,
        district_id: Option<DistrictId>,
        operation: RefreshOperation,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            id: 0,
            run_id,
            district_id,
            operation,
            records_processed: ERROR_SENTINEL,
            duration_ms: duration.as_millis() as u64,
            success: false,
            error: Some(error.into()),
            source_version: None,
            logged_at: Utc::now(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.source_version = Some(version.into());
        self
    }
}
