//! API error types with HTTP response mapping.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use event_store::EventStoreError;
use pipeline::CollectorError;
use projections::ProjectionError;
use thiserror::Error;

/// Seconds an agent is asked to wait before resubmitting after a 503.
pub const RETRY_AFTER_SECS: u64 = 5;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Collector rejected or could not hand off the submission.
    Collector(CollectorError),
    /// Read-model query failed.
    Projection(ProjectionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::Collector(err) => collector_error_to_response(err),
            ApiError::Projection(err) => {
                tracing::error!(error = %err, "read model query failed");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    let body = serde_json::json!({ "error": message });
    (status, axum::Json(body)).into_response()
}

fn collector_error_to_response(err: CollectorError) -> Response {
    match &err {
        CollectorError::Invalid(_) => error_body(StatusCode::BAD_REQUEST, err.to_string()),
        CollectorError::Store(source) => {
            tracing::error!(error = %source, "failed to persist envelope");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        CollectorError::Backpressure { .. } | CollectorError::Closed { .. } => {
            let body = serde_json::json!({
                "error": err.to_string(),
                "envelope_id": err.envelope_id(),
            });
            let mut response =
                (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
            response
        }
    }
}

impl From<CollectorError> for ApiError {
    fn from(err: CollectorError) -> Self {
        ApiError::Collector(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}

/// Failures that stop the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to prepare event store: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Failed to build projector registry: {0}")]
    Registry(#[from] ProjectionError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
