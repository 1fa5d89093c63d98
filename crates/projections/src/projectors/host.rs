use async_trait::async_trait;
use domain::event_types::{HOST_DEREGISTERED, HOST_DISCOVERED, HOST_HEARTBEAT};
use domain::{Host, HostDeregistered, HostDiscovered, HostHeartbeat};
use event_store::Envelope;

use crate::store::ReadModelTxn;
use crate::{ProjectionError, Projector, Result};

/// Maintains `hosts`: one row per agent, removed on deregistration.
/// Heartbeats only touch `last_heartbeat_at` of an already discovered host.
pub struct HostProjector;

#[async_trait]
impl Projector for HostProjector {
    fn name(&self) -> &'static str {
        "hosts"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[HOST_DISCOVERED, HOST_DEREGISTERED, HOST_HEARTBEAT]
    }

    async fn project(&self, envelope: &Envelope, txn: &mut dyn ReadModelTxn) -> Result<()> {
        match envelope.event_type.as_str() {
            HOST_DISCOVERED => {
                let payload: HostDiscovered = envelope.decode()?;
                let host =
                    Host::from_payload(envelope.source.clone(), payload, envelope.received_at)?;
                txn.upsert_host(&host).await
            }
            HOST_HEARTBEAT => {
                let _: HostHeartbeat = envelope.decode()?;
                let known = txn
                    .record_heartbeat(&envelope.source, envelope.received_at)
                    .await?;
                if !known {
                    tracing::debug!(agent_id = %envelope.source, "heartbeat for undiscovered host");
                }
                Ok(())
            }
            HOST_DEREGISTERED => {
                let payload: HostDeregistered = envelope.decode()?;
                let removed = txn.delete_host(&envelope.source).await?;
                tracing::info!(
                    agent_id = %envelope.source,
                    removed,
                    reason = payload.reason.as_deref().unwrap_or("unspecified"),
                    "host deregistered"
                );
                Ok(())
            }
            _ => Err(ProjectionError::UnknownEventType(envelope.event_type.clone())),
        }
    }
}
