//! StreetMetrics Refresh - Per-district refresh pipeline
//!
//! Sequences clipping, clustering, node estimation and rollup aggregation for
//! one district, publishes the result as a new generation, and drives
//! failure-isolated batch refreshes over every active district.

pub mod batch;
pub mod orchestrator;
pub mod readers;
pub mod rollup;
pub mod state;

pub use batch::{BatchSummary, DistrictOutcome};
pub use orchestrator::{DistrictReport, RefreshOrchestrator};
pub use readers::{
    budget_inputs, freshness, groups_in_tile, trend, BudgetInputs, Freshness, TrendPoint,
};
pub use rollup::aggregate_rollups;
pub use state::RefreshState;
