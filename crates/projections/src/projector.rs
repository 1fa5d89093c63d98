//! The projector capability.

use async_trait::async_trait;
use event_store::Envelope;

use crate::Result;
use crate::store::ReadModelTxn;

/// Applies envelopes of one or more event types to the read models.
///
/// A projector must write only through `txn`. Returning an error rolls the
/// transaction back, so a failed envelope leaves no partial writes behind.
#[async_trait]
pub trait Projector: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Event types this projector handles.
    fn event_types(&self) -> &'static [&'static str];

    async fn project(&self, envelope: &Envelope, txn: &mut dyn ReadModelTxn) -> Result<()>;
}
