//! HTTP route handlers.

pub mod collect;
pub mod health;
pub mod hosts;
pub mod metrics;
pub mod subscriptions;
