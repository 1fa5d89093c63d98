//! Liveness endpoints.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /health`: returns system health status.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /api/ping`: agents call this before they start reporting.
pub async fn ping() -> Json<HealthResponse> {
    Json(HealthResponse { status: "pong" })
}
