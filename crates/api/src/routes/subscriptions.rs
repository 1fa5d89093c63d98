//! Read-only view of the subscription ledger.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::SourceId;
use projections::{Subscription, SubscriptionLedger};

use crate::AppState;
use crate::error::ApiError;

/// `GET /api/subscriptions`: every (agent, event type) pair seen so far.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Subscription>>, ApiError> {
    let subscriptions = state.read_models.list_subscriptions().await?;
    Ok(Json(subscriptions))
}

/// `GET /api/subscriptions/{agent_id}`: the pairs reported by one agent.
#[tracing::instrument(skip(state))]
pub async fn for_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    let source = SourceId::new(agent_id);
    let subscriptions = state.read_models.subscriptions_for_source(&source).await?;
    if subscriptions.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No subscriptions recorded for agent {source}"
        )));
    }
    Ok(Json(subscriptions))
}
