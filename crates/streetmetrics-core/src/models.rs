pub mod district;
pub mod geometry;
pub mod refresh;
pub mod rollup;
pub mod segment;

pub use district::{District, DistrictId};
pub use geometry::{
    Crs, DistanceUnit, ValidityMode, FEET_PER_METER, METERS_PER_KILOMETER, METERS_PER_MILE,
};
pub use refresh::{RefreshLogEntry, RefreshOperation, ERROR_SENTINEL};
pub use rollup::{CalculationType, ClassTotals, NodeSummary, RollupRecord, SegmentSet};
pub use segment::{DedupGroup, GroupId, RawSegment, RoadClass, SegmentId, SourceSegment};
