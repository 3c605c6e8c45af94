use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// StreetMetrics - District road network metrics
#[derive(Parser, Debug)]
#[command(name = "streetmetrics")]
#[command(about = "District road network metrics", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./streetmetrics.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Storage backend to use (memory or postgres)
    #[arg(long, global = true, default_value = "memory")]
    pub storage: StorageBackend,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StorageBackend {
    /// In-memory storage (results live for one invocation)
    Memory,
    /// PostgreSQL persistent storage
    Postgres,
}

/// Settings that override the config file and environment
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// CRS EPSG code of the source geometries
    #[arg(long, global = true)]
    pub crs: Option<u32>,

    /// Comma separated road classes eligible for deduplication
    #[arg(long, global = true, value_name = "CLASSES")]
    pub major_classes: Option<String>,

    /// Buffer radius in meters for parallel carriageway detection
    #[arg(long, global = true, value_name = "METERS")]
    pub buffer_tolerance: Option<f64>,

    /// Node estimator scope: all, clustering, or a comma separated class list
    #[arg(long, global = true, value_name = "SCOPE")]
    pub node_scope: Option<String>,

    /// Segment set the node estimator runs over (raw or deduplicated)
    #[arg(long, global = true, value_name = "SET")]
    pub node_segment_set: Option<String>,

    /// Geometry validity mode (strict or lenient)
    #[arg(long, global = true)]
    pub validity: Option<String>,

    /// Concurrent district workers in batch mode
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Per-district deadline in seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Unit for displayed lengths (m, km, mi, ft)
    #[arg(long, global = true)]
    pub unit: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refresh districts from GeoJSON sources
    Refresh(RefreshArgs),

    /// Show refresh status of every district
    Status(StatusArgs),

    /// Inspect configuration, district results or the refresh log
    Inspect(InspectArgs),

    /// List deduplicated road groups inside a map tile
    Tiles(TilesArgs),

    /// Show the rollup history of a district
    Trend(TrendArgs),
}

#[derive(Parser, Debug)]
pub struct RefreshArgs {
    /// District boundaries (GeoJSON FeatureCollection of polygons)
    #[arg(long, value_name = "PATH")]
    pub districts: PathBuf,

    /// Road features (GeoJSON FeatureCollection of lines)
    #[arg(long, value_name = "PATH")]
    pub roads: PathBuf,

    /// Refresh only these districts (all active districts if omitted)
    #[arg(long = "district", value_name = "ID")]
    pub district_ids: Vec<u64>,
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Show only this district
    #[arg(long, value_name = "ID")]
    pub district: Option<u64>,

    /// Age in seconds after which published data counts as stale
    #[arg(long, default_value = "86400")]
    pub stale_after: i64,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    #[command(subcommand)]
    pub target: InspectTarget,
}

#[derive(Subcommand, Debug)]
pub enum InspectTarget {
    /// Show effective configuration and where each value came from
    Config,

    /// Show published rollups, node summary and groups of a district
    District {
        /// District id
        id: u64,
    },

    /// Show refresh log entries
    Log {
        /// Only entries of this district
        #[arg(long, value_name = "ID")]
        district: Option<u64>,

        /// Show at most this many of the latest entries
        #[arg(long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Parser, Debug)]
pub struct TilesArgs {
    /// Tile address as z/x/y
    pub tile: String,
}

#[derive(Parser, Debug)]
pub struct TrendArgs {
    /// District id
    pub district: u64,

    /// Segment set to follow (raw or deduplicated)
    #[arg(long, default_value = "deduplicated")]
    pub set: String,
}
