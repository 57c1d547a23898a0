//! Pipeline services
//!
//! Padding pipeline: discovery, duration probe, encode + replace with retry.
//! Synthesis pipeline: pairing, variant orchestration, rate limiting.
//! Both run external tools through [`ProcessRunner`].

pub mod duration_probe;
pub mod file_scanner;
pub mod list_generator;
pub mod media_tool;
pub mod padding_engine;
pub mod pairing_engine;
pub mod process_runner;
pub mod rate_limiter;
pub mod retry;
pub mod variant_orchestrator;

pub use duration_probe::DurationProbe;
pub use file_scanner::{FileScanner, ScanError};
pub use list_generator::{ListGenerator, ListReport};
pub use media_tool::{FfmpegTool, FileReplacer, FsReplacer, MediaTool};
pub use padding_engine::PaddingEngine;
pub use pairing_engine::PairingEngine;
pub use process_runner::{ProcessOutput, ProcessRunner};
pub use rate_limiter::{Permit, RateLimiter};
pub use retry::{Backoff, ErrorClass, RetryPolicy};
pub use variant_orchestrator::{
    CommandSynthesizer, SynthesisParams, Synthesizer, VariantOrchestrator,
};
