//! Batch execution: the shared worker-pool harness and reporter sinks

pub mod harness;
pub mod reporter;

pub use harness::{BatchContext, BatchHarness, BatchReport};
pub use reporter::{forward_json_events, spawn_stdout_forwarder, TracingReporter};
