//! # voxprep common library
//!
//! Shared code for the voxprep batch tools:
//! - Error type and `Result` alias
//! - TOML configuration model and config file resolution
//! - Batch event model, the reporter interface and the broadcast event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{
    BatchEvent, BatchKind, BatchReporter, BatchSummary, EventBus, FailureLine, OutcomeKind,
};
