use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Failures of the backing stores (record stores, media store, presigner)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{operation} query failed: {source}")]
    Query {
        operation: &'static str,
        source: sqlx::Error,
    },

    #[error("Failed to presign {link}: {message}")]
    Presign { link: String, message: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Wrap a sqlx error with the operation that issued it
    pub fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Query { operation, source }
    }
}

/// Errors surfaced by a search request
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid parameter {param}: {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Backing store unavailable: {0}")]
    BackingStoreUnavailable(#[from] StoreError),
}

impl SearchError {
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::InvalidParameter { .. } => "invalid_parameter",
            SearchError::BackingStoreUnavailable(_) => "backing_store_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SearchError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            SearchError::BackingStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        match &self {
            SearchError::InvalidParameter { .. } => warn!(error = %self, "Rejected search request"),
            SearchError::BackingStoreUnavailable(_) => error!(error = %self, "Search failed"),
        }

        metrics::counter!("search.failures", "kind" => self.code()).increment(1);

        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_status() {
        let invalid = SearchError::invalid("page", "must be a positive integer");
        assert_eq!(invalid.code(), "invalid_parameter");
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let store: SearchError = StoreError::Unavailable("connection refused".to_string()).into();
        assert_eq!(store.code(), "backing_store_unavailable");
        assert_eq!(store.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_query_error_names_operation() {
        let err = StoreError::query("telemetry")(sqlx::Error::PoolTimedOut);
        assert!(err.to_string().starts_with("telemetry query failed"));
    }
}
