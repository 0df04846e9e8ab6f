use crate::config::SearchConfig;
use crate::error::{SearchError, StoreError};
use crate::filters::{FilterSpec, SearchRequest};
use crate::matcher::{match_records, ModalityFilter};
use crate::model::{AcqId, MediaLink, Second};
use crate::paginator::{compare_acquisitions, paginate, sort_acquisitions, PageInfo};
use crate::presign::LinkSigner;
use crate::sampler::sample_seconds;
use crate::second_set::{intersect_all, SecondSet};
use crate::store::{is_image_extension, SearchStore};
use chrono::{DateTime, Utc};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use metrics::{counter, histogram};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Which pipeline served a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPath {
    Fast,
    Slow,
}

impl SearchPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPath::Fast => "fast",
            SearchPath::Slow => "slow",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub matched_acq_ids: u64,
    pub matched_seconds: u64,
    pub total_links: u64,
}

/// Search result returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub filters_echo: Value,
    pub counts: Counts,
    pub page_info: PageInfo,
    pub documents: Vec<MediaLink>,
    /// Set when document links are presigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links_expire_at: Option<DateTime<Utc>>,
}

impl SearchResponse {
    fn empty(request: &SearchRequest) -> Self {
        Self {
            filters_echo: request.echo(),
            counts: Counts::default(),
            page_info: PageInfo::empty(request.page, request.per_page),
            documents: Vec::new(),
            links_expire_at: None,
        }
    }
}

/// Stateless search pipeline over a [`SearchStore`]
pub struct SearchEngine {
    store: Arc<dyn SearchStore>,
    signer: LinkSigner,
    samples_per_acquisition: usize,
    fast_path_enabled: bool,
}

type ModalityFuture<'a> = BoxFuture<'a, Result<SecondSet, StoreError>>;

/// Fetch one modality's records and reduce them to matching seconds
fn match_modality<'a, F, Fut>(
    filter: &'a F,
    universe: &'a HashSet<String>,
    fetch: Fut,
) -> ModalityFuture<'a>
where
    F: ModalityFilter + Sync,
    Fut: Future<Output = Result<Vec<F::Record>, StoreError>> + Send + 'a,
{
    async move {
        let records = fetch.await?;
        let matched = match_records(filter, &records, universe);

        debug!(
            modality = %F::MODALITY,
            records = records.len(),
            acquisitions = matched.len(),
            seconds = matched.total_seconds(),
            "Modality matched"
        );

        Ok(matched)
    }
    .boxed()
}

/// Sort by acquisition order, then `sec` (acquisition-level first), `ext`, `link`
fn order_documents(documents: &mut Vec<MediaLink>) {
    documents.sort_by(|a, b| {
        compare_acquisitions(&a.acq_id, &b.acq_id)
            .then_with(|| a.sec.cmp(&b.sec))
            .then_with(|| a.ext.cmp(&b.ext))
            .then_with(|| a.link.cmp(&b.link))
    });
    documents.dedup();
}

impl SearchEngine {
    pub fn new(store: Arc<dyn SearchStore>, signer: LinkSigner, config: &SearchConfig) -> Self {
        Self {
            store,
            signer,
            samples_per_acquisition: config.samples_per_acquisition.max(1),
            fast_path_enabled: config.fast_path_enabled,
        }
    }

    pub fn store(&self) -> &Arc<dyn SearchStore> {
        &self.store
    }

    /// Pipeline a request will take
    pub fn path_for(&self, request: &SearchRequest) -> SearchPath {
        if self.fast_path_enabled && !request.filters.is_active() {
            SearchPath::Fast
        } else {
            SearchPath::Slow
        }
    }

    /// Run a normalized search request
    #[instrument(skip_all, fields(page = request.page, per_page = request.per_page))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let path = self.path_for(request);
        let started = Instant::now();

        counter!("search.requests", "path" => path.as_str()).increment(1);

        let result = self.execute(path, request).await;

        histogram!("search.duration_seconds", "path" => path.as_str())
            .record(started.elapsed().as_secs_f64());

        let response = result?;

        histogram!("search.documents").record(response.documents.len() as f64);

        info!(
            path = path.as_str(),
            matched_acq_ids = response.counts.matched_acq_ids,
            matched_seconds = response.counts.matched_seconds,
            documents = response.documents.len(),
            "Search completed"
        );

        Ok(response)
    }

    async fn execute(
        &self,
        path: SearchPath,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchError> {
        let mut universe = self.store.resolve_universe(&request.facets).await?;
        sort_acquisitions(&mut universe);

        if universe.is_empty() {
            debug!("Empty acquisition universe");
            return Ok(SearchResponse::empty(request));
        }

        match path {
            SearchPath::Fast => self.fast_path(request, &universe).await,
            SearchPath::Slow => self.slow_path(request, &universe).await,
        }
    }

    /// Sample links straight from the media store, without per-second sets
    async fn fast_path(
        &self,
        request: &SearchRequest,
        universe: &[AcqId],
    ) -> Result<SearchResponse, SearchError> {
        let mut acquisitions = self
            .store
            .media_acquisitions(universe, &request.extensions)
            .await?;
        sort_acquisitions(&mut acquisitions);

        let page = paginate(&acquisitions, request.page, request.per_page);
        if page.items.is_empty() {
            return self
                .respond(request, Vec::new(), page.info, acquisitions.len() as u64, 0)
                .await;
        }

        let links = self
            .store
            .sample_links(&page.items, &request.extensions, self.samples_per_acquisition)
            .await?;

        let matched_seconds = links
            .iter()
            .filter_map(|link| link.sec.map(|sec| (link.acq_id.as_str(), sec)))
            .collect::<HashSet<_>>()
            .len() as u64;

        let mut documents = links;
        documents.extend(self.artifacts(&page.items, &request.extensions).await?);

        self.respond(
            request,
            documents,
            page.info,
            acquisitions.len() as u64,
            matched_seconds,
        )
        .await
    }

    /// Evaluate modality filters, intersect, then look up links for sampled seconds
    async fn slow_path(
        &self,
        request: &SearchRequest,
        universe: &[AcqId],
    ) -> Result<SearchResponse, SearchError> {
        let matched = match self.match_modalities(&request.filters, universe).await? {
            Some(matched) if matched.is_empty() => {
                debug!("Active filters matched nothing");
                return Ok(SearchResponse::empty(request));
            }
            Some(matched) => matched,
            None => self
                .store
                .media_seconds(universe, &request.extensions)
                .await?
                .into_iter()
                .collect(),
        };

        let mut acquisitions: Vec<&AcqId> = matched.acquisitions().collect();
        sort_acquisitions(&mut acquisitions);

        let page = paginate(&acquisitions, request.page, request.per_page);

        let pairs: Vec<(AcqId, Second)> = page
            .items
            .iter()
            .filter_map(|acq_id| matched.seconds(acq_id).map(|seconds| (*acq_id, seconds)))
            .flat_map(|(acq_id, seconds)| {
                sample_seconds(seconds, self.samples_per_acquisition)
                    .into_iter()
                    .map(move |sec| (acq_id.clone(), sec))
            })
            .collect();

        let mut documents = if pairs.is_empty() {
            Vec::new()
        } else {
            self.store
                .links_for_pairs(&pairs, &request.extensions)
                .await?
        };

        let page_ids: Vec<AcqId> = page.items.iter().map(|acq_id| (*acq_id).clone()).collect();
        documents.extend(self.artifacts(&page_ids, &request.extensions).await?);

        self.respond(
            request,
            documents,
            page.info,
            matched.len() as u64,
            matched.total_seconds() as u64,
        )
        .await
    }

    /// Run every active modality concurrently and fold the results
    ///
    /// Returns `None` when no modality filter is active. The first failing
    /// modality aborts the request and drops the remaining queries.
    async fn match_modalities(
        &self,
        filters: &FilterSpec,
        universe: &[AcqId],
    ) -> Result<Option<SecondSet>, StoreError> {
        let members: HashSet<String> = universe.iter().cloned().collect();
        let store = self.store.as_ref();
        let mut pending: Vec<ModalityFuture<'_>> = Vec::new();

        if filters.telemetry.is_active() {
            pending.push(match_modality(
                &filters.telemetry,
                &members,
                store.telemetry(universe, &filters.telemetry),
            ));
        }
        if filters.lane.is_active() {
            pending.push(match_modality(
                &filters.lane,
                &members,
                store.lanes(universe, &filters.lane),
            ));
        }
        if filters.objects.is_active() {
            pending.push(match_modality(
                &filters.objects,
                &members,
                store.objects(universe, &filters.objects),
            ));
        }
        if filters.road.is_active() {
            pending.push(match_modality(
                &filters.road,
                &members,
                store.road(universe, &filters.road),
            ));
        }
        if filters.segmentation.is_active() {
            pending.push(match_modality(
                &filters.segmentation,
                &members,
                store.segmentation(universe, &filters.segmentation),
            ));
        }

        if pending.is_empty() {
            return Ok(None);
        }

        let sets = try_join_all(pending).await?;
        Ok(intersect_all(sets))
    }

    /// Acquisition-level artifacts, only requested for non-image extensions
    async fn artifacts(
        &self,
        acquisitions: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<MediaLink>, StoreError> {
        if acquisitions.is_empty() || extensions.iter().all(|ext| is_image_extension(ext)) {
            return Ok(Vec::new());
        }

        self.store
            .acquisition_artifacts(acquisitions, extensions)
            .await
    }

    async fn respond(
        &self,
        request: &SearchRequest,
        mut documents: Vec<MediaLink>,
        page_info: PageInfo,
        matched_acq_ids: u64,
        matched_seconds: u64,
    ) -> Result<SearchResponse, SearchError> {
        order_documents(&mut documents);
        let documents = self.signer.sign(documents).await?;

        Ok(SearchResponse {
            filters_echo: request.echo(),
            counts: Counts {
                matched_acq_ids,
                matched_seconds,
                total_links: documents.len() as u64,
            },
            page_info,
            documents,
            links_expire_at: self.signer.expires_at(),
        })
    }
}
