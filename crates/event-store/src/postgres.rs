use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Envelope, EnvelopeId, EnvelopeQuery, EventStoreError, EventType, NewEnvelope, Result,
    SourceId,
    store::{EnvelopeStream, EventStore, STREAM_PAGE_SIZE},
};

/// PostgreSQL-backed envelope store.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL envelope store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations for the envelope log and read models.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_envelope(row: PgRow) -> Result<Envelope> {
        Ok(Envelope {
            id: EnvelopeId::new(row.try_get("id")?),
            source: SourceId::new(row.try_get::<String, _>("source")?),
            event_type: EventType::new(row.try_get::<String, _>("event_type")?),
            payload: row.try_get("payload")?,
            received_at: row.try_get("received_at")?,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, envelope), fields(source = %envelope.source, event_type = %envelope.event_type))]
    async fn persist(&self, envelope: NewEnvelope) -> Result<EnvelopeId> {
        envelope.validate()?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO envelopes (source, event_type, payload, received_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(envelope.source.as_str())
        .bind(envelope.event_type.as_str())
        .bind(&envelope.payload)
        .bind(envelope.received_at)
        .fetch_one(&self.pool)
        .await?;

        metrics::counter!("event_store_envelopes_persisted_total").increment(1);
        Ok(EnvelopeId::new(id))
    }

    async fn get_envelope(&self, id: EnvelopeId) -> Result<Option<Envelope>> {
        let row = sqlx::query(
            r#"
            SELECT id, source, event_type, payload, received_at
            FROM envelopes
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_envelope).transpose()
    }

    async fn query_envelopes(&self, query: EnvelopeQuery) -> Result<Vec<Envelope>> {
        let mut sql = String::from(
            "SELECT id, source, event_type, payload, received_at FROM envelopes WHERE 1=1",
        );
        let mut param_count = 0;

        // Build dynamic query
        if query.source.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND source = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.after.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND id > ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND received_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND received_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(source) = query.source {
            sqlx_query = sqlx_query.bind(source.as_str().to_string());
        }
        if let Some(event_types) = query.event_types {
            let event_types: Vec<String> = event_types
                .into_iter()
                .map(|t| t.as_str().to_string())
                .collect();
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(after) = query.after {
            sqlx_query = sqlx_query.bind(after.as_i64());
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_envelope).collect()
    }

    async fn stream_envelopes(&self, after: Option<EnvelopeId>) -> Result<EnvelopeStream> {
        let pool = self.pool.clone();
        let start = after.map(|id| id.as_i64()).unwrap_or(0);

        // Keyset pagination keeps the stream independent of the pool borrow.
        let pages = stream::unfold(Some(start), move |cursor| {
            let pool = pool.clone();
            async move {
                let after = cursor?;
                let rows = sqlx::query(
                    r#"
                    SELECT id, source, event_type, payload, received_at
                    FROM envelopes
                    WHERE id > $1
                    ORDER BY id ASC
                    LIMIT $2
                    "#,
                )
                .bind(after)
                .bind(STREAM_PAGE_SIZE)
                .fetch_all(&pool)
                .await;

                match rows {
                    Ok(rows) if rows.is_empty() => None,
                    Ok(rows) => {
                        let page: Vec<Result<Envelope>> =
                            rows.into_iter().map(Self::row_to_envelope).collect();
                        let next = page
                            .iter()
                            .rev()
                            .find_map(|r| r.as_ref().ok().map(|e| e.id.as_i64()));
                        Some((stream::iter(page), next))
                    }
                    Err(e) => Some((stream::iter(vec![Err(EventStoreError::Database(e))]), None)),
                }
            }
        });

        Ok(Box::pin(pages.flatten()))
    }

    async fn envelope_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM envelopes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
