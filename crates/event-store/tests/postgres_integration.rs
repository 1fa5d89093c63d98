//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a running Docker
//! daemon, so they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use event_store::{
    EnvelopeId, EnvelopeQuery, EventStore, EventStoreError, EventStoreExt, NewEnvelope,
    PostgresEventStore,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresEventStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and an empty envelope table
async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE envelopes RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn new_envelope(source: &str, event_type: &str) -> NewEnvelope {
    NewEnvelope::new(source, event_type, serde_json::json!({"hostname": "node01"}))
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn persist_and_retrieve_envelope() {
    let store = get_test_store().await;

    let id = store
        .persist(new_envelope("host-1", "host.discovered"))
        .await
        .unwrap();

    let envelope = store.get_envelope(id).await.unwrap().unwrap();
    assert_eq!(envelope.source.as_str(), "host-1");
    assert_eq!(envelope.event_type.as_str(), "host.discovered");
    assert_eq!(envelope.payload, serde_json::json!({"hostname": "node01"}));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn ids_increase_in_persistence_order() {
    let store = get_test_store().await;

    let first = store
        .persist(new_envelope("host-1", "host.discovered"))
        .await
        .unwrap();
    let second = store
        .persist(new_envelope("host-1", "host.discovered"))
        .await
        .unwrap();

    assert!(first < second);
    assert_eq!(store.envelope_count().await.unwrap(), 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn invalid_envelope_is_not_persisted() {
    let store = get_test_store().await;

    let result = store.persist(new_envelope("host-1", "")).await;

    assert!(matches!(result, Err(EventStoreError::InvalidEnvelope(_))));
    assert_eq!(store.envelope_count().await.unwrap(), 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn query_envelopes_with_filters() {
    let store = get_test_store().await;

    store
        .persist(new_envelope("host-1", "host.discovered"))
        .await
        .unwrap();
    let second = store
        .persist(new_envelope("host-2", "cluster.discovered"))
        .await
        .unwrap();
    store
        .persist(new_envelope("host-1", "cluster.discovered"))
        .await
        .unwrap();

    let by_type = store
        .query_envelopes(EnvelopeQuery::for_event_type("cluster.discovered"))
        .await
        .unwrap();
    assert_eq!(by_type.len(), 2);

    let after = store
        .query_envelopes(EnvelopeQuery::new().after(second))
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].source.as_str(), "host-1");

    let limited = store
        .query_envelopes(EnvelopeQuery::new().limit(1).offset(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, second);

    let for_source = store.envelopes_for_source("host-1").await.unwrap();
    assert_eq!(for_source.len(), 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn stream_envelopes_across_pages() {
    use futures_util::StreamExt;

    let store = get_test_store().await;
    for i in 0..1200 {
        store
            .persist(new_envelope(&format!("host-{}", i % 7), "host.discovered"))
            .await
            .unwrap();
    }

    let ids: Vec<EnvelopeId> = store
        .stream_envelopes(None)
        .await
        .unwrap()
        .map(|r| r.unwrap().id)
        .collect()
        .await;

    assert_eq!(ids.len(), 1200);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let tail: Vec<_> = store
        .stream_envelopes(Some(ids[1099]))
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(tail.len(), 100);
}
