//! Identifier types shared by every crate in the pipeline.

pub mod types;

pub use types::{EventType, SourceId};
