//! Data model shared by the padding and synthesis pipelines

pub mod jobs;
pub mod media;
pub mod pairing;

pub use jobs::{
    BatchJob, FailureReason, ItemOutcome, PaddingJob, PaddingStatus, SynthesisJob, SynthesisStatus,
};
pub use media::{DurationMeasurement, MediaFile};
pub use pairing::{derive_label, ReferenceAudio, SynthesisPair, TextEntry};
