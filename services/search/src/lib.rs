//! Vehicle Data Search Service
//!
//! Faceted search over per-second vehicle sensor recordings. A request names
//! coarse acquisition facets plus per-modality predicates (telemetry, lane
//! markings, object detections, road attributes, semantic segmentation); the
//! service returns the acquisitions with at least one second satisfying every
//! active predicate, paginated, with a few representative media links each.
//!
//! ## Features
//!
//! - **Per-second intersection**: modality filters combine as an AND over the
//!   same second of the same acquisition, never across seconds
//! - **Representative sampling**: up to K evenly spread seconds per
//!   acquisition, always covering the first and last matching second
//! - **Fast path**: filterless queries sample media links directly in one
//!   grouped query instead of materializing per-second sets
//! - **Presigned links**: optional rewriting of `s3://` links to time-limited
//!   HTTPS URLs
//!
//! ## Architecture
//!
//! ```text
//! HTTP query                  PostgreSQL
//! ┌──────────────┐            ┌──────────────┐
//! │ /api/v1/     │            │ acquisitions │
//! │   search     │            │ telemetry    │
//! └──────────────┘            │ lane_markings│
//!        │                    │ object_det.. │
//!        ▼                    │ road_attr..  │
//! ┌──────────────┐            │ segmentation │
//! │ Normalizer   │            │ media_links  │
//! └──────────────┘            └──────────────┘
//!        │                           ▲
//!        ▼                           │
//! ┌──────────────┐   universe ┌──────────────┐
//! │ Search       │───────────▶│ Search       │
//! │ Engine       │◀───────────│ Store        │
//! └──────────────┘    records └──────────────┘
//!        │
//!        ├─ matchers ─▶ intersection ─▶ paginator ─▶ sampler
//!        ▼
//! ┌──────────────┐
//! │ Link         │──▶ presign ──▶ JSON response
//! │ Enricher     │
//! └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod filters;
pub mod groups;
pub mod matcher;
pub mod model;
pub mod paginator;
pub mod presign;
pub mod sampler;
pub mod second_set;
pub mod store;

pub use api::{create_router, start_api_server, AppState};
pub use config::Config;
pub use engine::{Counts, SearchEngine, SearchPath, SearchResponse};
pub use error::{SearchError, StoreError};
pub use filters::{normalize, FilterSpec, RawSearchParams, SearchRequest};
pub use model::{AcqId, MediaLink, Second};
pub use presign::LinkSigner;
pub use second_set::SecondSet;
pub use store::{MemoryStore, PgSearchStore, SearchStore};
