//! Re-feeds persisted envelopes to the dispatcher.
//!
//! Used at startup to pick up envelopes that were persisted but never
//! projected (queue full, crash, shutdown mid-queue). Envelopes that were
//! already applied are skipped by the dispatcher's stale check, so replaying
//! from the beginning is safe.

use std::sync::Arc;

use event_store::{EnvelopeId, EventStore};
use futures_util::StreamExt;

use crate::Result;
use crate::dispatcher::IngressSender;

/// Summary of one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub enqueued: u64,
    pub last_envelope_id: Option<EnvelopeId>,
}

pub struct Replayer {
    store: Arc<dyn EventStore>,
    ingress: IngressSender,
}

impl Replayer {
    pub fn new(store: Arc<dyn EventStore>, ingress: IngressSender) -> Self {
        Self { store, ingress }
    }

    /// Enqueues every envelope with an id greater than `after` (all of them
    /// when `None`), in id order, waiting for queue capacity as needed.
    #[tracing::instrument(skip(self))]
    pub async fn replay(&self, after: Option<EnvelopeId>) -> Result<ReplayStats> {
        let mut stats = ReplayStats::default();
        let mut stream = self.store.stream_envelopes(after).await?;

        while let Some(envelope) = stream.next().await {
            let envelope = envelope?;
            let id = envelope.id;
            self.ingress.enqueue_wait(envelope).await?;

            stats.enqueued += 1;
            stats.last_envelope_id = Some(id);
            metrics::counter!("replay_envelopes_total").increment(1);
        }

        tracing::info!(
            enqueued = stats.enqueued,
            last_envelope_id = ?stats.last_envelope_id,
            "replay complete"
        );
        Ok(stats)
    }
}
