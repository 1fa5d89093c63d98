//! Fact submission endpoint used by agents.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use common::{EventType, SourceId};
use pipeline::Ack;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

/// Body of a collect request.
#[derive(Debug, Deserialize)]
pub struct CollectRequest {
    pub agent_id: String,
    pub discovery_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// `POST /api/collect`: persists a reported fact and queues it for projection.
///
/// Answers `202 Accepted` once the envelope is durable; projection happens
/// asynchronously.
#[tracing::instrument(skip_all)]
pub async fn submit(
    State(state): State<Arc<AppState>>,
    request: Result<Json<CollectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    let Json(request) = request.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let result = state
        .collector
        .submit(
            request.payload,
            SourceId::new(request.agent_id),
            EventType::new(request.discovery_type),
        )
        .await;

    let status = if result.is_ok() { "accepted" } else { "rejected" };
    metrics::counter!("http_collect_requests_total", "status" => status).increment(1);

    Ok((StatusCode::ACCEPTED, Json(result?)))
}
