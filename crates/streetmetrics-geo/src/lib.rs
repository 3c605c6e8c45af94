//! StreetMetrics Geo - Segment geometry operations
//!
//! This crate holds the geometric core of the refresh pipeline: clipping raw
//! segments to district boundaries, deduplicating parallel carriageways,
//! estimating intersections from endpoints, and tile bounds for map consumers.

pub mod clip;
pub mod cluster;
pub mod nodes;
pub mod projection;
pub mod tiles;
pub mod validation;

pub use clip::{clip_segments, ClipOutcome};
pub use cluster::{cluster_segments, ClusterOutcome, UnionFind};
pub use nodes::{estimate_group_nodes, estimate_nodes, node_key, NodeEstimate, NodeKey};
pub use tiles::{tile_bounds, TileCoord};
