use super::{is_image_extension, SearchStore};
use crate::error::StoreError;
use crate::filters::{
    AcquisitionFacets, LaneFilter, ObjectFilter, RoadFilter, SegmentationFilter, TelemetryFilter,
};
use crate::matcher::categorical_matches;
use crate::model::{
    AcqId, Acquisition, Keyed, LaneRecord, MediaLink, ObjectDetection, RoadRecord, Second,
    SegmentationRecord, TelemetryRecord,
};
use crate::paginator::sort_acquisitions;
use crate::sampler::sample;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// In-process store holding every record in memory
///
/// Performs no predicate pushdown; rows are only restricted to the requested
/// acquisitions and left for the matchers to evaluate.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    acquisitions: Vec<Acquisition>,
    telemetry: Vec<TelemetryRecord>,
    lanes: Vec<LaneRecord>,
    objects: Vec<ObjectDetection>,
    road: Vec<RoadRecord>,
    segmentation: Vec<SegmentationRecord>,
    links: Vec<MediaLink>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_acquisition(mut self, acquisition: Acquisition) -> Self {
        self.acquisitions.push(acquisition);
        self
    }

    pub fn with_telemetry(mut self, records: impl IntoIterator<Item = TelemetryRecord>) -> Self {
        self.telemetry.extend(records);
        self
    }

    pub fn with_lanes(mut self, records: impl IntoIterator<Item = LaneRecord>) -> Self {
        self.lanes.extend(records);
        self
    }

    pub fn with_objects(mut self, records: impl IntoIterator<Item = ObjectDetection>) -> Self {
        self.objects.extend(records);
        self
    }

    pub fn with_road(mut self, records: impl IntoIterator<Item = RoadRecord>) -> Self {
        self.road.extend(records);
        self
    }

    pub fn with_segmentation(
        mut self,
        records: impl IntoIterator<Item = SegmentationRecord>,
    ) -> Self {
        self.segmentation.extend(records);
        self
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = MediaLink>) -> Self {
        self.links.extend(links);
        self
    }

    fn in_universe<R: Keyed + Clone>(records: &[R], universe: &[AcqId]) -> Vec<R> {
        let universe: HashSet<&str> = universe.iter().map(String::as_str).collect();
        records
            .iter()
            .filter(|record| universe.contains(record.acq_id()))
            .cloned()
            .collect()
    }

    /// Per-second links of allowed extensions for the given acquisitions
    fn second_links<'a>(
        &'a self,
        acquisitions: &'a [AcqId],
        extensions: &'a [String],
    ) -> impl Iterator<Item = &'a MediaLink> + 'a {
        self.links.iter().filter(move |link| {
            link.sec.is_some()
                && acquisitions.contains(&link.acq_id)
                && extension_allowed(extensions, &link.ext)
        })
    }
}

fn extension_allowed(extensions: &[String], ext: &str) -> bool {
    extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn resolve_universe(&self, facets: &AcquisitionFacets) -> Result<Vec<AcqId>, StoreError> {
        let mut ids: Vec<AcqId> = self
            .acquisitions
            .iter()
            .filter(|acq| facets.ids.is_empty() || facets.ids.contains(&acq.acq_id))
            .filter(|acq| categorical_matches(&facets.vehicle, acq.vehicle.as_deref()))
            .filter(|acq| categorical_matches(&facets.period, acq.period.as_deref()))
            .filter(|acq| categorical_matches(&facets.weather, acq.weather.as_deref()))
            .filter(|acq| categorical_matches(&facets.country, acq.country.as_deref()))
            .map(|acq| acq.acq_id.clone())
            .collect();

        sort_acquisitions(&mut ids);
        Ok(ids)
    }

    async fn telemetry(
        &self,
        universe: &[AcqId],
        _filter: &TelemetryFilter,
    ) -> Result<Vec<TelemetryRecord>, StoreError> {
        Ok(Self::in_universe(&self.telemetry, universe))
    }

    async fn lanes(
        &self,
        universe: &[AcqId],
        _filter: &LaneFilter,
    ) -> Result<Vec<LaneRecord>, StoreError> {
        Ok(Self::in_universe(&self.lanes, universe))
    }

    async fn objects(
        &self,
        universe: &[AcqId],
        _filter: &ObjectFilter,
    ) -> Result<Vec<ObjectDetection>, StoreError> {
        Ok(Self::in_universe(&self.objects, universe))
    }

    async fn road(
        &self,
        universe: &[AcqId],
        _filter: &RoadFilter,
    ) -> Result<Vec<RoadRecord>, StoreError> {
        Ok(Self::in_universe(&self.road, universe))
    }

    async fn segmentation(
        &self,
        universe: &[AcqId],
        _filter: &SegmentationFilter,
    ) -> Result<Vec<SegmentationRecord>, StoreError> {
        Ok(Self::in_universe(&self.segmentation, universe))
    }

    async fn media_acquisitions(
        &self,
        universe: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<AcqId>, StoreError> {
        let mut ids: Vec<AcqId> = self
            .second_links(universe, extensions)
            .map(|link| link.acq_id.clone())
            .collect();

        sort_acquisitions(&mut ids);
        Ok(ids)
    }

    async fn media_seconds(
        &self,
        universe: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<(AcqId, Second)>, StoreError> {
        Ok(self
            .second_links(universe, extensions)
            .filter_map(|link| link.sec.map(|sec| (link.acq_id.clone(), sec)))
            .collect())
    }

    async fn links_for_pairs(
        &self,
        pairs: &[(AcqId, Second)],
        extensions: &[String],
    ) -> Result<Vec<MediaLink>, StoreError> {
        let wanted: HashSet<(&str, Second)> = pairs
            .iter()
            .map(|(acq_id, sec)| (acq_id.as_str(), *sec))
            .collect();

        Ok(self
            .links
            .iter()
            .filter(|link| {
                link.sec
                    .is_some_and(|sec| wanted.contains(&(link.acq_id.as_str(), sec)))
                    && extension_allowed(extensions, &link.ext)
            })
            .cloned()
            .collect())
    }

    async fn acquisition_artifacts(
        &self,
        acquisitions: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<MediaLink>, StoreError> {
        Ok(self
            .links
            .iter()
            .filter(|link| {
                link.sec.is_none()
                    && acquisitions.contains(&link.acq_id)
                    && extension_allowed(extensions, &link.ext)
                    && !is_image_extension(&link.ext)
            })
            .cloned()
            .collect())
    }

    async fn sample_links(
        &self,
        acquisitions: &[AcqId],
        extensions: &[String],
        per_acquisition: usize,
    ) -> Result<Vec<MediaLink>, StoreError> {
        let mut seconds: BTreeMap<&str, BTreeSet<Second>> = BTreeMap::new();
        for link in self.second_links(acquisitions, extensions) {
            if let Some(sec) = link.sec {
                seconds.entry(link.acq_id.as_str()).or_default().insert(sec);
            }
        }

        let picked: HashSet<(&str, Second)> = seconds
            .iter()
            .flat_map(|(acq_id, secs)| {
                let ordered: Vec<Second> = secs.iter().copied().collect();
                sample(&ordered, per_acquisition)
                    .into_iter()
                    .map(move |sec| (*acq_id, sec))
            })
            .collect();

        Ok(self
            .second_links(acquisitions, extensions)
            .filter(|link| {
                link.sec
                    .is_some_and(|sec| picked.contains(&(link.acq_id.as_str(), sec)))
            })
            .cloned()
            .collect())
    }
}
