//! API server entry point.

use std::process::ExitCode;
use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::error::StartupError;
use event_store::{EventStore, PostgresEventStore};
use pipeline::RetryPolicy;
use projections::{PostgresReadModelStore, ReadModelStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM), then cancels `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
        () = token.cancelled() => {}
    }

    token.cancel();
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Connects to PostgreSQL, retrying while the database comes up.
async fn connect(config: &Config, url: &str) -> Result<PgPool, sqlx::Error> {
    RetryPolicy::startup()
        .retry(
            |_: &sqlx::Error| true,
            |attempt| {
                tracing::info!(attempt, "connecting to database");
                PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .connect(url)
            },
        )
        .await
}

async fn open_stores(
    config: &Config,
) -> Result<(Arc<dyn EventStore>, Arc<dyn ReadModelStore>), StartupError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, running on in-memory stores");
        let event_store: Arc<dyn EventStore> = Arc::new(event_store::InMemoryEventStore::new());
        let read_models: Arc<dyn ReadModelStore> =
            Arc::new(projections::InMemoryReadModelStore::new());
        return Ok((event_store, read_models));
    };

    let pool = connect(config, url).await?;
    let postgres = PostgresEventStore::new(pool.clone());
    postgres.run_migrations().await?;
    tracing::info!("database migrations applied");

    let event_store: Arc<dyn EventStore> = Arc::new(postgres);
    let read_models: Arc<dyn ReadModelStore> = Arc::new(PostgresReadModelStore::new(pool));
    Ok((event_store, read_models))
}

async fn run(config: Config) -> Result<(), StartupError> {
    // 1. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 2. Open stores and wire the pipeline
    let (event_store, read_models) = open_stores(&config).await?;
    let wiring = api::create_pipeline(event_store, read_models, config.pipeline.clone())?;

    // 3. Start the worker pool
    let shutdown = CancellationToken::new();
    let dispatcher = tokio::spawn(wiring.dispatcher.run(shutdown.clone()));

    // 4. Re-feed persisted envelopes; the stale guard skips what is already projected
    if config.replay_on_start {
        let replayer = wiring.replayer;
        tokio::spawn(async move {
            match replayer.replay(None).await {
                Ok(stats) => tracing::info!(
                    enqueued = stats.enqueued,
                    last_envelope_id = ?stats.last_envelope_id,
                    "startup replay finished"
                ),
                Err(err) => tracing::error!(error = %err, "startup replay failed"),
            }
        });
    } else {
        drop(wiring.replayer);
    }

    // 5. Serve until a shutdown signal arrives
    let app = api::create_app(wiring.state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    // 6. Drain the dispatcher even when the server failed
    shutdown.cancel();
    if let Err(err) = dispatcher.await {
        tracing::error!(error = %err, "dispatcher task failed");
    }

    served?;
    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    init_tracing(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "api server failed");
            ExitCode::FAILURE
        }
    }
}
