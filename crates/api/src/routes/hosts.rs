//! Host liveness endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{EventType, SourceId};
use domain::event_types::HOST_HEARTBEAT;
use pipeline::Ack;

use crate::AppState;
use crate::error::ApiError;

/// `POST /api/hosts/{agent_id}/heartbeat`: records that the agent is alive.
///
/// Goes through the collector like any other fact, so a heartbeat is
/// persisted and acknowledged with `202 Accepted` before it is projected.
#[tracing::instrument(skip(state))]
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    let result = state
        .collector
        .submit(
            serde_json::json!({}),
            SourceId::new(agent_id),
            EventType::from(HOST_HEARTBEAT),
        )
        .await;

    let status = if result.is_ok() { "accepted" } else { "rejected" };
    metrics::counter!("http_heartbeat_requests_total", "status" => status).increment(1);

    Ok((StatusCode::ACCEPTED, Json(result?)))
}
