use async_trait::async_trait;
use domain::event_types::CHECKS_RESULT_REPORTED;
use domain::{ChecksResult, ChecksResultReported};
use event_store::Envelope;

use crate::store::ReadModelTxn;
use crate::{Projector, Result};

/// Maintains `checks_results`, one row per check group.
pub struct ChecksResultProjector;

#[async_trait]
impl Projector for ChecksResultProjector {
    fn name(&self) -> &'static str {
        "checks_results"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[CHECKS_RESULT_REPORTED]
    }

    async fn project(&self, envelope: &Envelope, txn: &mut dyn ReadModelTxn) -> Result<()> {
        let payload: ChecksResultReported = envelope.decode()?;
        let result =
            ChecksResult::from_payload(envelope.source.clone(), payload, envelope.received_at)?;
        txn.upsert_checks_result(&result).await
    }
}
