//! Worker pool that applies envelopes to the read models.
//!
//! A fixed number of workers share one bounded FIFO ingress queue. Each
//! worker takes an envelope, resolves its projector and runs it inside a
//! read-model transaction together with the ledger update, then takes the
//! next one. Nothing a single envelope does (an error, a panic, an unknown
//! event type) stops a worker.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use event_store::Envelope;
use futures_util::FutureExt;
use projections::{
    OutcomeRecord, ProjectionError, Projector, ProjectorRegistry, ReadModelStore,
    SubscriptionLedger,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::error::EnqueueError;
use crate::retry::RetryPolicy;

/// Ledger reason recorded for envelopes without a projector.
pub const UNKNOWN_EVENT_TYPE: &str = "unknown event type";

/// What happened to one dispatched envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Projected and committed together with a success ledger entry.
    Applied,
    /// Not newer than the last applied envelope of its pair; nothing changed.
    Skipped,
    /// No projector registered; failure recorded.
    UnknownEventType,
    /// Projection failed and was rolled back; failure recorded.
    Failed { reason: String },
}

impl DispatchOutcome {
    /// Label used for the `outcome` metric dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Applied => "applied",
            DispatchOutcome::Skipped => "skipped",
            DispatchOutcome::UnknownEventType => "unknown_event_type",
            DispatchOutcome::Failed { .. } => "failed",
        }
    }
}

/// Producer side of the ingress queue.
#[derive(Clone)]
pub struct IngressSender {
    tx: mpsc::Sender<Envelope>,
    timeout: Duration,
}

impl IngressSender {
    /// Enqueues `envelope`, waiting at most the configured enqueue timeout
    /// for room in the queue.
    pub async fn enqueue(&self, envelope: Envelope) -> Result<(), EnqueueError> {
        match self.tx.send_timeout(envelope, self.timeout).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                metrics::counter!("collector_backpressure_total").increment(1);
                Err(EnqueueError::Backpressure {
                    timeout: self.timeout,
                })
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    /// Enqueues `envelope`, waiting as long as it takes. Used by replay,
    /// which must not drop anything.
    pub async fn enqueue_wait(&self, envelope: Envelope) -> Result<(), EnqueueError> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| EnqueueError::Closed)
    }

    /// Free slots in the ingress queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Per-envelope processing shared by all workers.
struct Executor {
    registry: Arc<ProjectorRegistry>,
    store: Arc<dyn ReadModelStore>,
    retry: RetryPolicy,
}

enum Projected {
    Applied,
    Stale,
}

impl Executor {
    #[tracing::instrument(
        skip(self, envelope),
        fields(envelope_id = %envelope.id, source = %envelope.source, event_type = %envelope.event_type)
    )]
    async fn dispatch(&self, envelope: &Envelope) -> DispatchOutcome {
        let started = Instant::now();

        let outcome = match self.registry.resolve(envelope.event_type.as_str()) {
            Ok(projector) => self.project(projector.as_ref(), envelope).await,
            Err(_) => {
                tracing::warn!("no projector registered for event type");
                self.record_failure(envelope, UNKNOWN_EVENT_TYPE).await;
                DispatchOutcome::UnknownEventType
            }
        };

        metrics::counter!("dispatcher_envelopes_total", "outcome" => outcome.as_str())
            .increment(1);
        metrics::histogram!("dispatcher_projection_seconds")
            .record(started.elapsed().as_secs_f64());

        outcome
    }

    async fn project(&self, projector: &dyn Projector, envelope: &Envelope) -> DispatchOutcome {
        let result = self
            .retry
            .retry(ProjectionError::is_transient, |attempt| {
                if attempt > 1 {
                    metrics::counter!("dispatcher_retries_total").increment(1);
                }
                self.project_once(projector, envelope)
            })
            .await;

        match result {
            Ok(Projected::Applied) => {
                tracing::debug!(projector = projector.name(), "envelope applied");
                DispatchOutcome::Applied
            }
            Ok(Projected::Stale) => {
                tracing::debug!("envelope not newer than last applied, skipped");
                DispatchOutcome::Skipped
            }
            Err(err) => {
                let reason = err.to_string();
                tracing::warn!(projector = projector.name(), error = %reason, "projection failed");
                self.record_failure(envelope, &reason).await;
                DispatchOutcome::Failed { reason }
            }
        }
    }

    /// One transactional attempt: lock the ledger row, skip stale envelopes,
    /// project, record success, commit. Any error rolls everything back.
    async fn project_once(
        &self,
        projector: &dyn Projector,
        envelope: &Envelope,
    ) -> Result<Projected, ProjectionError> {
        let mut txn = self.store.begin().await?;

        let result: Result<Projected, ProjectionError> = async {
            let current = txn
                .subscription_for_update(&envelope.source, &envelope.event_type)
                .await?;
            if current.is_some_and(|sub| sub.is_stale(envelope.id)) {
                return Ok(Projected::Stale);
            }

            AssertUnwindSafe(projector.project(envelope, txn.as_mut()))
                .catch_unwind()
                .await
                .map_err(|_| {
                    tracing::error!(projector = projector.name(), "projector panicked");
                    ProjectionError::Panicked
                })??;

            txn.record_outcome(&OutcomeRecord::success(envelope))
                .await?;
            Ok(Projected::Applied)
        }
        .await;

        match result {
            Ok(Projected::Applied) => {
                txn.commit().await?;
                Ok(Projected::Applied)
            }
            Ok(Projected::Stale) => {
                txn.rollback().await?;
                Ok(Projected::Stale)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Writes a failure to the ledger outside the rolled-back transaction.
    async fn record_failure(&self, envelope: &Envelope, reason: &str) {
        let result = self
            .retry
            .retry(ProjectionError::is_transient, |_| {
                self.store
                    .record_outcome(OutcomeRecord::failure(envelope, reason))
            })
            .await;

        if let Err(err) = result {
            metrics::counter!("dispatcher_ledger_write_failures_total").increment(1);
            tracing::error!(error = %err, reason, "failed to record failure outcome");
        }
    }
}

/// Consumer side of the pipeline: owns the ingress queue and the worker pool.
pub struct Dispatcher {
    executor: Arc<Executor>,
    ingress: Arc<Mutex<mpsc::Receiver<Envelope>>>,
    workers: usize,
    shutdown_grace: Duration,
}

impl Dispatcher {
    /// Creates the dispatcher and the sender feeding its ingress queue.
    ///
    /// `run` returns once every sender clone is dropped and the queue is
    /// empty, so callers should not keep a spare sender around.
    pub fn new(
        registry: Arc<ProjectorRegistry>,
        store: Arc<dyn ReadModelStore>,
        config: PipelineConfig,
    ) -> (Self, IngressSender) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        let dispatcher = Self {
            executor: Arc::new(Executor {
                registry,
                store,
                retry: config.retry,
            }),
            ingress: Arc::new(Mutex::new(rx)),
            workers: config.workers.max(1),
            shutdown_grace: config.shutdown_grace,
        };
        let sender = IngressSender {
            tx,
            timeout: config.enqueue_timeout,
        };

        (dispatcher, sender)
    }

    /// Processes a single envelope on the caller's task, bypassing the queue.
    pub async fn dispatch(&self, envelope: &Envelope) -> DispatchOutcome {
        self.executor.dispatch(envelope).await
    }

    /// Runs the worker pool until `shutdown` is cancelled or the ingress
    /// queue is closed and drained.
    ///
    /// On cancellation no further envelopes are dequeued. Envelopes already
    /// being processed get up to the shutdown grace period to finish; any
    /// worker still busy after that is aborted and its transaction is rolled
    /// back when dropped.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(worker_loop(
                id,
                Arc::clone(&self.executor),
                Arc::clone(&self.ingress),
                shutdown.clone(),
            ));
        }
        tracing::info!(workers = self.workers, "dispatcher started");

        tokio::select! {
            () = join_all(&mut workers) => {
                tracing::info!("ingress closed, dispatcher stopped");
                return;
            }
            () = shutdown.cancelled() => {}
        }

        tracing::info!(grace = ?self.shutdown_grace, "draining in-flight envelopes");
        if tokio::time::timeout(self.shutdown_grace, join_all(&mut workers))
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = workers.len(),
                "shutdown grace elapsed, aborting workers"
            );
            workers.abort_all();
            join_all(&mut workers).await;
        }
        tracing::info!("dispatcher stopped");
    }
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        if let Err(err) = result
            && err.is_panic()
        {
            tracing::error!(error = %err, "dispatcher worker panicked");
        }
    }
}

async fn worker_loop(
    id: usize,
    executor: Arc<Executor>,
    ingress: Arc<Mutex<mpsc::Receiver<Envelope>>>,
    shutdown: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            envelope = async { ingress.lock().await.recv().await } => envelope,
        };
        let Some(envelope) = next else {
            break;
        };

        if AssertUnwindSafe(executor.dispatch(&envelope))
            .catch_unwind()
            .await
            .is_err()
        {
            tracing::error!(envelope_id = %envelope.id, worker = id, "dispatch panicked");
        }
    }
    tracing::debug!(worker = id, "worker stopped");
}
