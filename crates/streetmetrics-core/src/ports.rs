use crate::error::Result;
use crate::models::{District, SourceSegment};
use async_trait::async_trait;

/// Port for the upstream boundary registry and road geometry source
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// List every district known to the boundary registry
    async fn list_districts(&self) -> Result<Vec<District>>;

    /// Fetch road features intersecting the district boundary.
    ///
    /// Features may extend past the boundary; clipping happens during ingest.
    async fn fetch_segments(&self, district: &District) -> Result<Vec<SourceSegment>>;
}
