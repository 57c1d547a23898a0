//! voxprep library interface
//!
//! Exposes the pipelines for the `voxprep` binary and integration tests.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{BatchError, BatchResult, ToolError};
