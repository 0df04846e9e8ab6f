use crate::config::{ApiConfig, SearchConfig};
use crate::engine::{SearchEngine, SearchResponse};
use crate::error::SearchError;
use crate::filters::{normalize, RawSearchParams};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub search: SearchConfig,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/v1/search", get(search))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "search-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Search acquisitions and return representative media links
#[instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn search(
    State(state): State<AppState>,
    params: Result<Query<RawSearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, SearchError> {
    let Query(raw) =
        params.map_err(|rejection| SearchError::invalid("query", rejection.body_text()))?;

    let request = normalize(&raw, &state.search)?;
    let response = state.engine.search(&request).await?;

    Ok(Json(response))
}

/// Start the search API server, stopping when `shutdown` is cancelled
pub async fn start_api_server(
    state: AppState,
    config: &ApiConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting search API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::{Acquisition, MediaLink, TelemetryRecord};
    use crate::presign::LinkSigner;
    use crate::store::{MemoryStore, MockSearchStore, SearchStore};
    use axum::body::{self, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::util::ServiceExt;

    fn router(store: impl SearchStore + 'static) -> Router {
        let search = SearchConfig::default();
        let engine = SearchEngine::new(Arc::new(store), LinkSigner::disabled(), &search);
        let state = AppState {
            engine: Arc::new(engine),
            search,
        };

        create_router(state, &ApiConfig::default())
    }

    fn fleet() -> MemoryStore {
        let mut store = MemoryStore::new();
        for (acq, speed) in [("1", "72"), ("2", "30")] {
            store = store
                .with_acquisition(Acquisition {
                    acq_id: acq.to_string(),
                    ..Default::default()
                })
                .with_telemetry([TelemetryRecord {
                    acq_id: acq.to_string(),
                    sec: 4,
                    speed: Some(speed.to_string()),
                    ..Default::default()
                }])
                .with_links([MediaLink::new(
                    acq,
                    Some(4),
                    "jpg",
                    &format!("s3://media/{acq}/4.jpg"),
                )]);
        }
        store
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(router(MemoryStore::new()), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "search-service");
    }

    #[tokio::test]
    async fn test_ready_with_reachable_store() {
        let (status, body) = get_json(router(MemoryStore::new()), "/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn test_search_with_filter() {
        let (status, body) =
            get_json(router(fleet()), "/api/v1/search?telemetry.speed=60..80&per_page=10").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["counts"]["matched_acq_ids"], 1);
        assert_eq!(body["documents"][0]["acq_id"], "1");
        assert_eq!(body["documents"][0]["sec"], 4);
        assert_eq!(body["page_info"]["per_page"], 10);
        assert!(body["filters_echo"]["telemetry"]["speed"].is_array());
    }

    #[tokio::test]
    async fn test_malformed_page_is_bad_request() {
        let (status, body) = get_json(router(fleet()), "/api/v1/search?page=abc").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_parameter");
    }

    #[tokio::test]
    async fn test_unknown_parameter_is_bad_request() {
        let (status, body) = get_json(router(fleet()), "/api/v1/search?telemetry.sped=1..2").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_parameter");
    }

    #[tokio::test]
    async fn test_store_failure_is_service_unavailable() {
        let mut store = MockSearchStore::new();
        store
            .expect_resolve_universe()
            .returning(|_| Err(StoreError::Unavailable("connection refused".to_string())));

        let (status, body) = get_json(router(store), "/api/v1/search").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "backing_store_unavailable");
    }
}
