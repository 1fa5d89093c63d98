//! HTTP collector boundary for the fact pipeline.
//!
//! Agents post facts to `/api/collect` and liveness to
//! `/api/hosts/{agent_id}/heartbeat`; the collector persists both and hands
//! them to the dispatcher. Health collaborators read the
//! subscription ledger through `/api/subscriptions`. Structured logging
//! comes from tracing and counters are exported at `/metrics`.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_store::{EventStore, InMemoryEventStore};
use metrics_exporter_prometheus::PrometheusHandle;
use pipeline::{Collector, Dispatcher, PipelineConfig, Replayer};
use projections::{InMemoryReadModelStore, ProjectionError, ProjectorRegistry, ReadModelStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub collector: Collector,
    pub read_models: Arc<dyn ReadModelStore>,
}

/// Everything `main` needs to run the pipeline behind the router.
pub struct Pipeline {
    pub state: Arc<AppState>,
    pub dispatcher: Dispatcher,
    pub replayer: Replayer,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/ping", get(routes::health::ping))
        .route("/api/collect", post(routes::collect::submit))
        .route(
            "/api/hosts/{agent_id}/heartbeat",
            post(routes::hosts::heartbeat),
        )
        .route("/api/subscriptions", get(routes::subscriptions::list))
        .route(
            "/api/subscriptions/{agent_id}",
            get(routes::subscriptions::for_agent),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the collector, dispatcher and replayer over the given stores with
/// the production projectors registered.
pub fn create_pipeline(
    event_store: Arc<dyn EventStore>,
    read_models: Arc<dyn ReadModelStore>,
    config: PipelineConfig,
) -> Result<Pipeline, ProjectionError> {
    let registry = Arc::new(ProjectorRegistry::default_registry()?);
    tracing::info!(event_types = ?registry.event_types(), "projector registry built");

    let (dispatcher, ingress) = Dispatcher::new(registry, read_models.clone(), config);
    let collector = Collector::new(event_store.clone(), ingress.clone());
    let replayer = Replayer::new(event_store, ingress);

    Ok(Pipeline {
        state: Arc::new(AppState {
            collector,
            read_models,
        }),
        dispatcher,
        replayer,
    })
}

/// Creates a pipeline on in-memory stores, used without `DATABASE_URL` and
/// in tests.
pub fn create_default_state(config: PipelineConfig) -> Result<Pipeline, ProjectionError> {
    create_pipeline(
        Arc::new(InMemoryEventStore::new()),
        Arc::new(InMemoryReadModelStore::new()),
        config,
    )
}
