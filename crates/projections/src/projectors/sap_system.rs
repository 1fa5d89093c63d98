use async_trait::async_trait;
use domain::event_types::SAP_SYSTEM_DISCOVERED;
use domain::{SapSystemDiscovered, SapSystemInstance};
use event_store::Envelope;

use crate::store::ReadModelTxn;
use crate::{Projector, Result};

/// Maintains `sap_system_instances`. Each report carries the full set of
/// instances on the host, so instances missing from it are removed.
pub struct SapSystemProjector;

#[async_trait]
impl Projector for SapSystemProjector {
    fn name(&self) -> &'static str {
        "sap_system_instances"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[SAP_SYSTEM_DISCOVERED]
    }

    async fn project(&self, envelope: &Envelope, txn: &mut dyn ReadModelTxn) -> Result<()> {
        let payload: SapSystemDiscovered = envelope.decode()?;
        let instances =
            SapSystemInstance::from_payload(&envelope.source, payload, envelope.received_at)?;
        txn.replace_sap_system_instances(&envelope.source, &instances)
            .await
    }
}
