use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventType, SourceId};
use domain::{
    CheckResultEntry, ChecksResult, Cluster, DomainError, Host, SapSystemInstance,
    SlesSubscription,
};
use event_store::EnvelopeId;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};

use super::{ReadModelStore, ReadModelTxn};
use crate::ledger::{Outcome, OutcomeRecord, Subscription, SubscriptionLedger};
use crate::{ProjectionError, Result};

const SUBSCRIPTION_COLUMNS: &str =
    "source, event_type, last_envelope_id, last_processed_at, last_outcome, failure_reason";

/// PostgreSQL-backed read models.
///
/// Tables are created by the shared migrations run through
/// `PostgresEventStore::run_migrations`.
#[derive(Clone)]
pub struct PostgresReadModelStore {
    pool: PgPool,
}

impl PostgresReadModelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

struct PostgresTxn {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresTxn {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(ProjectionError::TransactionClosed),
        }
    }
}

/// Narrows a BIGINT column value back to the entity's unsigned count.
fn to_u32(field: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        DomainError::OutOfRange {
            field,
            value: value.to_string(),
        }
        .into()
    })
}

fn to_u64(field: &'static str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        DomainError::OutOfRange {
            field,
            value: value.to_string(),
        }
        .into()
    })
}

fn to_i64(field: &'static str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        DomainError::OutOfRange {
            field,
            value: value.to_string(),
        }
        .into()
    })
}

fn row_to_subscription(row: &PgRow) -> Result<Subscription> {
    let outcome = match row.try_get::<String, _>("last_outcome")?.as_str() {
        "success" => Outcome::Success,
        "failure" => Outcome::Failure(
            row.try_get::<Option<String>, _>("failure_reason")?
                .unwrap_or_default(),
        ),
        other => {
            return Err(DomainError::UnknownVariant {
                kind: "outcome",
                value: other.to_string(),
            }
            .into());
        }
    };

    Ok(Subscription {
        source: SourceId::new(row.try_get::<String, _>("source")?),
        event_type: EventType::new(row.try_get::<String, _>("event_type")?),
        last_envelope_id: row
            .try_get::<Option<i64>, _>("last_envelope_id")?
            .map(EnvelopeId::new),
        last_processed_at: row.try_get("last_processed_at")?,
        outcome,
    })
}

fn row_to_host(row: &PgRow) -> Result<Host> {
    Ok(Host {
        agent_id: SourceId::new(row.try_get::<String, _>("agent_id")?),
        hostname: row.try_get("hostname")?,
        ip_addresses: row.try_get::<Json<Vec<String>>, _>("ip_addresses")?.0,
        os_version: row.try_get("os_version")?,
        agent_version: row.try_get("agent_version")?,
        cpu_count: to_u32("cpu_count", row.try_get("cpu_count")?)?,
        socket_count: to_u32("socket_count", row.try_get("socket_count")?)?,
        total_memory_mb: to_u64("total_memory_mb", row.try_get("total_memory_mb")?)?,
        updated_at: row.try_get("updated_at")?,
        last_heartbeat_at: row.try_get("last_heartbeat_at")?,
    })
}

fn row_to_cluster(row: &PgRow) -> Result<Cluster> {
    Ok(Cluster {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        cluster_type: row.try_get::<String, _>("cluster_type")?.parse()?,
        sid: row.try_get("sid")?,
        nodes: row.try_get::<Json<Vec<String>>, _>("nodes")?.0,
        resources_number: to_u32("resources_number", row.try_get("resources_number")?)?,
        hosts_number: to_u32("hosts_number", row.try_get("hosts_number")?)?,
        reported_by: SourceId::new(row.try_get::<String, _>("reported_by")?),
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_sap_instance(row: &PgRow) -> Result<SapSystemInstance> {
    Ok(SapSystemInstance {
        agent_id: SourceId::new(row.try_get::<String, _>("agent_id")?),
        sid: row.try_get("sid")?,
        instance_number: row.try_get("instance_number")?,
        system_type: row.try_get::<String, _>("system_type")?.parse()?,
        features: row.try_get("features")?,
        sap_hostname: row.try_get("sap_hostname")?,
        system_replication: row.try_get("system_replication")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_sles_subscription(row: &PgRow) -> Result<SlesSubscription> {
    Ok(SlesSubscription {
        agent_id: SourceId::new(row.try_get::<String, _>("agent_id")?),
        identifier: row.try_get("identifier")?,
        version: row.try_get("version")?,
        arch: row.try_get("arch")?,
        status: row.try_get("status")?,
        expires_at: row.try_get("expires_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_checks_result(row: &PgRow) -> Result<ChecksResult> {
    Ok(ChecksResult {
        group_id: row.try_get("group_id")?,
        health: row.try_get::<String, _>("health")?.parse()?,
        results: row.try_get::<Json<Vec<CheckResultEntry>>, _>("results")?.0,
        reported_by: SourceId::new(row.try_get::<String, _>("reported_by")?),
        updated_at: row.try_get("updated_at")?,
    })
}

/// Upserts a ledger row. `GREATEST` ignores NULL, so a failure (which binds
/// no envelope id) leaves `last_envelope_id` untouched.
async fn upsert_subscription(
    conn: &mut PgConnection,
    record: &OutcomeRecord,
) -> Result<Subscription> {
    let sql = format!(
        r#"
        INSERT INTO subscriptions
            (source, event_type, last_envelope_id, last_processed_at, last_outcome, failure_reason)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source, event_type) DO UPDATE SET
            last_envelope_id = GREATEST(subscriptions.last_envelope_id, EXCLUDED.last_envelope_id),
            last_processed_at = GREATEST(subscriptions.last_processed_at, EXCLUDED.last_processed_at),
            last_outcome = EXCLUDED.last_outcome,
            failure_reason = EXCLUDED.failure_reason
        RETURNING {SUBSCRIPTION_COLUMNS}
        "#
    );

    let row = sqlx::query(&sql)
        .bind(record.source.as_str())
        .bind(record.event_type.as_str())
        .bind(
            record
                .outcome
                .is_success()
                .then_some(record.envelope_id.as_i64()),
        )
        .bind(record.processed_at)
        .bind(record.outcome.as_str())
        .bind(record.outcome.reason())
        .fetch_one(conn)
        .await?;

    row_to_subscription(&row)
}

#[async_trait]
impl ReadModelTxn for PostgresTxn {
    async fn subscription_for_update(
        &mut self,
        source: &SourceId,
        event_type: &EventType,
    ) -> Result<Option<Subscription>> {
        let conn = self.conn()?;

        // Claim the pair with a placeholder row so that concurrent first
        // sightings queue on the row lock too. The placeholder only survives
        // if this transaction records an outcome and commits.
        let inserted = sqlx::query(
            r#"
            INSERT INTO subscriptions (source, event_type)
            VALUES ($1, $2)
            ON CONFLICT (source, event_type) DO NOTHING
            RETURNING source
            "#,
        )
        .bind(source.as_str())
        .bind(event_type.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        if inserted.is_some() {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE source = $1 AND event_type = $2 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(source.as_str())
            .bind(event_type.as_str())
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn record_outcome(&mut self, record: &OutcomeRecord) -> Result<Subscription> {
        upsert_subscription(self.conn()?, record).await
    }

    async fn upsert_host(&mut self, host: &Host) -> Result<()> {
        let total_memory_mb = to_i64("total_memory_mb", host.total_memory_mb)?;
        sqlx::query(
            r#"
            INSERT INTO hosts
                (agent_id, hostname, ip_addresses, os_version, agent_version,
                 cpu_count, socket_count, total_memory_mb, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (agent_id) DO UPDATE SET
                hostname = EXCLUDED.hostname,
                ip_addresses = EXCLUDED.ip_addresses,
                os_version = EXCLUDED.os_version,
                agent_version = EXCLUDED.agent_version,
                cpu_count = EXCLUDED.cpu_count,
                socket_count = EXCLUDED.socket_count,
                total_memory_mb = EXCLUDED.total_memory_mb,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(host.agent_id.as_str())
        .bind(&host.hostname)
        .bind(Json(&host.ip_addresses))
        .bind(&host.os_version)
        .bind(&host.agent_version)
        .bind(i64::from(host.cpu_count))
        .bind(i64::from(host.socket_count))
        .bind(total_memory_mb)
        .bind(host.updated_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn delete_host(&mut self, agent_id: &SourceId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM hosts WHERE agent_id = $1")
            .bind(agent_id.as_str())
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_heartbeat(&mut self, agent_id: &SourceId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE hosts
            SET last_heartbeat_at = GREATEST(last_heartbeat_at, $2)
            WHERE agent_id = $1
            "#,
        )
        .bind(agent_id.as_str())
        .bind(at)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_cluster(&mut self, cluster: &Cluster) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clusters
                (id, name, cluster_type, sid, nodes, resources_number,
                 hosts_number, reported_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                cluster_type = EXCLUDED.cluster_type,
                sid = EXCLUDED.sid,
                nodes = EXCLUDED.nodes,
                resources_number = EXCLUDED.resources_number,
                hosts_number = EXCLUDED.hosts_number,
                reported_by = EXCLUDED.reported_by,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&cluster.id)
        .bind(&cluster.name)
        .bind(cluster.cluster_type.as_str())
        .bind(cluster.sid.as_deref())
        .bind(Json(&cluster.nodes))
        .bind(i64::from(cluster.resources_number))
        .bind(i64::from(cluster.hosts_number))
        .bind(cluster.reported_by.as_str())
        .bind(cluster.updated_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn replace_sap_system_instances(
        &mut self,
        agent_id: &SourceId,
        instances: &[SapSystemInstance],
    ) -> Result<()> {
        let conn = self.conn()?;

        sqlx::query("DELETE FROM sap_system_instances WHERE agent_id = $1")
            .bind(agent_id.as_str())
            .execute(&mut *conn)
            .await?;

        for instance in instances {
            sqlx::query(
                r#"
                INSERT INTO sap_system_instances
                    (agent_id, sid, instance_number, system_type, features,
                     sap_hostname, system_replication, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(agent_id.as_str())
            .bind(&instance.sid)
            .bind(&instance.instance_number)
            .bind(instance.system_type.as_str())
            .bind(&instance.features)
            .bind(&instance.sap_hostname)
            .bind(instance.system_replication.as_deref())
            .bind(instance.updated_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn replace_sles_subscriptions(
        &mut self,
        agent_id: &SourceId,
        subscriptions: &[SlesSubscription],
    ) -> Result<()> {
        let conn = self.conn()?;

        sqlx::query("DELETE FROM sles_subscriptions WHERE agent_id = $1")
            .bind(agent_id.as_str())
            .execute(&mut *conn)
            .await?;

        for sub in subscriptions {
            sqlx::query(
                r#"
                INSERT INTO sles_subscriptions
                    (agent_id, identifier, version, arch, status, expires_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(agent_id.as_str())
            .bind(&sub.identifier)
            .bind(&sub.version)
            .bind(&sub.arch)
            .bind(&sub.status)
            .bind(sub.expires_at)
            .bind(sub.updated_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn upsert_checks_result(&mut self, result: &ChecksResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checks_results (group_id, health, results, reported_by, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (group_id) DO UPDATE SET
                health = EXCLUDED.health,
                results = EXCLUDED.results,
                reported_by = EXCLUDED.reported_by,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&result.group_id)
        .bind(result.health.as_str())
        .bind(Json(&result.results))
        .bind(result.reported_by.as_str())
        .bind(result.updated_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(ProjectionError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(ProjectionError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionLedger for PostgresReadModelStore {
    #[tracing::instrument(skip(self, record), fields(source = %record.source, event_type = %record.event_type))]
    async fn record_outcome(&self, record: OutcomeRecord) -> Result<Subscription> {
        let mut conn = self.pool.acquire().await?;
        upsert_subscription(&mut conn, &record).await
    }

    async fn get_subscription(
        &self,
        source: &SourceId,
        event_type: &EventType,
    ) -> Result<Option<Subscription>> {
        // Placeholder rows left by in-flight transactions are invisible
        // outside them, so every row seen here carries a real outcome.
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE source = $1 AND event_type = $2"
        );
        let row = sqlx::query(&sql)
            .bind(source.as_str())
            .bind(event_type.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_subscription).transpose()
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY source, event_type"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_subscription).collect()
    }

    async fn subscriptions_for_source(&self, source: &SourceId) -> Result<Vec<Subscription>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE source = $1 ORDER BY event_type"
        );
        let rows = sqlx::query(&sql)
            .bind(source.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_subscription).collect()
    }
}

#[async_trait]
impl ReadModelStore for PostgresReadModelStore {
    async fn begin(&self) -> Result<Box<dyn ReadModelTxn>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTxn { tx: Some(tx) }))
    }

    async fn get_host(&self, agent_id: &SourceId) -> Result<Option<Host>> {
        let row = sqlx::query("SELECT * FROM hosts WHERE agent_id = $1")
            .bind(agent_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_host).transpose()
    }

    async fn list_hosts(&self) -> Result<Vec<Host>> {
        let rows = sqlx::query("SELECT * FROM hosts ORDER BY agent_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_host).collect()
    }

    async fn get_cluster(&self, id: &str) -> Result<Option<Cluster>> {
        let row = sqlx::query("SELECT * FROM clusters WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_cluster).transpose()
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        let rows = sqlx::query("SELECT * FROM clusters ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_cluster).collect()
    }

    async fn sap_system_instances(&self, agent_id: &SourceId) -> Result<Vec<SapSystemInstance>> {
        let rows = sqlx::query(
            "SELECT * FROM sap_system_instances WHERE agent_id = $1 ORDER BY sid, instance_number",
        )
        .bind(agent_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_sap_instance).collect()
    }

    async fn sles_subscriptions(&self, agent_id: &SourceId) -> Result<Vec<SlesSubscription>> {
        let rows = sqlx::query(
            "SELECT * FROM sles_subscriptions WHERE agent_id = $1 ORDER BY identifier",
        )
        .bind(agent_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_sles_subscription).collect()
    }

    async fn get_checks_result(&self, group_id: &str) -> Result<Option<ChecksResult>> {
        let row = sqlx::query("SELECT * FROM checks_results WHERE group_id = $1")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_checks_result).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_convert_without_wrapping() {
        assert_eq!(to_u32("cpu_count", i64::from(u32::MAX)).unwrap(), u32::MAX);
        assert!(matches!(
            to_u32("cpu_count", i64::from(u32::MAX) + 1),
            Err(ProjectionError::Validation(DomainError::OutOfRange { field: "cpu_count", .. }))
        ));
        assert!(to_u32("hosts_number", -1).is_err());
    }

    #[test]
    fn memory_converts_without_wrapping() {
        assert_eq!(to_i64("total_memory_mb", i64::MAX as u64).unwrap(), i64::MAX);
        assert!(to_i64("total_memory_mb", u64::MAX).is_err());
        assert!(to_u64("total_memory_mb", -1).is_err());
    }
}
