mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgSearchStore;

use crate::error::StoreError;
use crate::filters::{
    AcquisitionFacets, LaneFilter, ObjectFilter, RoadFilter, SegmentationFilter, TelemetryFilter,
};
use crate::model::{
    AcqId, LaneRecord, MediaLink, ObjectDetection, RoadRecord, Second, SegmentationRecord,
    TelemetryRecord,
};
use async_trait::async_trait;

/// Extensions treated as per-second imagery; anything else is an artifact type
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.iter().any(|image| image.eq_ignore_ascii_case(ext))
}

/// Read-only access to acquisitions, modality records and media links
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Connectivity check behind `/ready`
    async fn ping(&self) -> Result<(), StoreError>;

    /// Acquisition ids matching the acquisition-level facets
    async fn resolve_universe(&self, facets: &AcquisitionFacets) -> Result<Vec<AcqId>, StoreError>;

    async fn telemetry(
        &self,
        universe: &[AcqId],
        filter: &TelemetryFilter,
    ) -> Result<Vec<TelemetryRecord>, StoreError>;

    async fn lanes(&self, universe: &[AcqId], filter: &LaneFilter)
        -> Result<Vec<LaneRecord>, StoreError>;

    async fn objects(
        &self,
        universe: &[AcqId],
        filter: &ObjectFilter,
    ) -> Result<Vec<ObjectDetection>, StoreError>;

    async fn road(&self, universe: &[AcqId], filter: &RoadFilter)
        -> Result<Vec<RoadRecord>, StoreError>;

    async fn segmentation(
        &self,
        universe: &[AcqId],
        filter: &SegmentationFilter,
    ) -> Result<Vec<SegmentationRecord>, StoreError>;

    /// Acquisitions with at least one per-second link of an allowed extension
    async fn media_acquisitions(
        &self,
        universe: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<AcqId>, StoreError>;

    /// Every (acquisition, second) with a per-second link of an allowed extension
    async fn media_seconds(
        &self,
        universe: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<(AcqId, Second)>, StoreError>;

    /// Per-second links for exactly these pairs, in one lookup
    async fn links_for_pairs(
        &self,
        pairs: &[(AcqId, Second)],
        extensions: &[String],
    ) -> Result<Vec<MediaLink>, StoreError>;

    /// Acquisition-level artifacts (`sec = None`)
    async fn acquisition_artifacts(
        &self,
        acquisitions: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<MediaLink>, StoreError>;

    /// Links of up to `per_acquisition` evenly spread seconds per acquisition
    async fn sample_links(
        &self,
        acquisitions: &[AcqId],
        extensions: &[String],
        per_acquisition: usize,
    ) -> Result<Vec<MediaLink>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extensions() {
        assert!(is_image_extension("JPG"));
        assert!(is_image_extension("webp"));
        assert!(!is_image_extension("mp4"));
        assert!(!is_image_extension("mcap"));
    }
}
