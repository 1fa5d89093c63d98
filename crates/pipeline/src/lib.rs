//! Ingestion pipeline for agent facts.
//!
//! ```text
//! Collector ──persist──▶ EventStore
//!     │
//!     └──enqueue──▶ ingress queue ──▶ Dispatcher workers ──▶ projectors + ledger
//!                        ▲
//! Replayer ──stream──────┘
//! ```
//!
//! The collector acknowledges only after the envelope is durable. The
//! dispatcher applies envelopes with a fixed worker pool; replay re-feeds
//! persisted envelopes after a restart or an overload.

pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod replay;
pub mod retry;

pub use collector::{Ack, Collector};
pub use config::PipelineConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher, IngressSender, UNKNOWN_EVENT_TYPE};
pub use error::{CollectorError, EnqueueError, PipelineError, Result};
pub use replay::{ReplayStats, Replayer};
pub use retry::RetryPolicy;
