//! Test helpers: in-process fakes for the external tools
//!
//! No ffprobe, ffmpeg or synthesis engine is needed to run these tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use voxprep::error::ToolError;
use voxprep::models::{DurationMeasurement, MediaFile, SynthesisJob};
use voxprep::services::{Backoff, FileReplacer, MediaTool, RetryPolicy, Synthesizer};
use voxprep::workflow::{BatchContext, BatchHarness};
use voxprep_common::{BatchEvent, BatchReporter};

/// Media tool with scripted durations, keyed by path
///
/// Encoding copies the input and appends a marker, then records the padded
/// duration for the output path so a later measurement sees it.
#[derive(Default)]
pub struct FakeMediaTool {
    durations: Mutex<HashMap<PathBuf, f64>>,
    unreadable: HashSet<String>,
    probe_timeouts: HashSet<String>,
    fail_encode: bool,
    encode_timeout: Option<Duration>,
    encode_calls: AtomicUsize,
    measure_calls: AtomicUsize,
}

impl FakeMediaTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(self, path: &Path, seconds: f64) -> Self {
        self.durations
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), seconds);
        self
    }

    pub fn with_unreadable(mut self, path: &Path) -> Self {
        self.unreadable.insert(path.display().to_string());
        self
    }

    /// Measuring `path` runs into the probe deadline
    pub fn with_probe_timeout(mut self, path: &Path) -> Self {
        self.probe_timeouts.insert(path.display().to_string());
        self
    }

    /// Every encode leaves a partial side-file and hits its deadline
    pub fn timing_out_encode(mut self) -> Self {
        self.encode_timeout = Some(Duration::from_secs(300));
        self
    }

    pub fn failing_encode(mut self) -> Self {
        self.fail_encode = true;
        self
    }

    pub fn encode_calls(&self) -> usize {
        self.encode_calls.load(Ordering::SeqCst)
    }

    pub fn measure_calls(&self) -> usize {
        self.measure_calls.load(Ordering::SeqCst)
    }

    pub fn duration_of(&self, path: &Path) -> Option<f64> {
        self.durations.lock().unwrap().get(path).copied()
    }
}

#[async_trait]
impl MediaTool for FakeMediaTool {
    async fn measure(&self, file: &MediaFile) -> DurationMeasurement {
        self.measure_calls.fetch_add(1, Ordering::SeqCst);
        if self.probe_timeouts.contains(&file.path().display().to_string()) {
            return DurationMeasurement::invalid(
                file.path(),
                ToolError::Timeout(Duration::from_secs(30)),
            );
        }
        if self.unreadable.contains(&file.path().display().to_string()) {
            return DurationMeasurement::invalid(
                file.path(),
                ToolError::Unparsable("N/A".to_string()),
            );
        }
        match self.duration_of(file.path()) {
            Some(seconds) => DurationMeasurement::measured(file.path(), seconds),
            None => DurationMeasurement::invalid(
                file.path(),
                ToolError::ExitStatus {
                    code: Some(1),
                    stderr: "Invalid data found when processing input".to_string(),
                },
            ),
        }
    }

    async fn pad_with_silence(
        &self,
        input: &Path,
        silence_secs: f64,
        output: &Path,
    ) -> Result<(), ToolError> {
        self.encode_calls.fetch_add(1, Ordering::SeqCst);

        let mut bytes = std::fs::read(input).map_err(|e| ToolError::Launch {
            program: "fake-ffmpeg".to_string(),
            message: e.to_string(),
        })?;

        if let Some(limit) = self.encode_timeout {
            std::fs::write(output, &bytes[..bytes.len() / 2]).unwrap();
            return Err(ToolError::Timeout(limit));
        }

        if self.fail_encode {
            // Leave a partial artifact behind, as a crashed encoder would
            std::fs::write(output, &bytes[..bytes.len() / 2]).unwrap();
            return Err(ToolError::ExitStatus {
                code: Some(1),
                stderr: "Conversion failed!".to_string(),
            });
        }

        bytes.extend_from_slice(b"+silence");
        std::fs::write(output, bytes).unwrap();

        let original = self.duration_of(input).unwrap_or(0.0);
        let mut durations = self.durations.lock().unwrap();
        durations.insert(output.to_path_buf(), original + silence_secs);
        // After the replace, the original path holds the padded audio
        durations.insert(input.to_path_buf(), original + silence_secs);
        Ok(())
    }
}

/// Replacer failing the first `failures` calls with `kind`, then renaming
pub struct FlakyReplacer {
    failures: usize,
    kind: io::ErrorKind,
    calls: AtomicUsize,
}

impl FlakyReplacer {
    pub fn new(failures: usize, kind: io::ErrorKind) -> Self {
        Self {
            failures,
            kind,
            calls: AtomicUsize::new(0),
        }
    }

    /// Never succeeds
    pub fn always(kind: io::ErrorKind) -> Self {
        Self::new(usize::MAX, kind)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileReplacer for FlakyReplacer {
    async fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(io::Error::new(self.kind, "file is locked by another process"));
        }
        tokio::fs::rename(from, to).await
    }
}

/// Synthesizer that writes an empty output file, or fails for chosen outputs
#[derive(Default)]
pub struct FakeSynthesizer {
    fail_outputs: HashSet<String>,
    timeout_outputs: HashSet<String>,
    latency: Duration,
    calls: Mutex<Vec<SynthesisJob>>,
    spans: Mutex<Vec<(Instant, Instant)>>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every job whose output file name is `name`
    pub fn failing_on(mut self, name: &str) -> Self {
        self.fail_outputs.insert(name.to_string());
        self
    }

    /// Jobs whose output file name is `name` hit the synthesis deadline
    pub fn timing_out_on(mut self, name: &str) -> Self {
        self.timeout_outputs.insert(name.to_string());
        self
    }

    /// Each call takes `latency` before returning
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// `(start, end)` of every call, in start order
    pub fn spans(&self) -> Vec<(Instant, Instant)> {
        let mut spans = self.spans.lock().unwrap().clone();
        spans.sort();
        spans
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<SynthesisJob> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, job: &SynthesisJob) -> Result<(), ToolError> {
        let started = Instant::now();
        self.calls.lock().unwrap().push(job.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self.outcome(job);
        self.spans.lock().unwrap().push((started, Instant::now()));
        result
    }
}

impl FakeSynthesizer {
    fn outcome(&self, job: &SynthesisJob) -> Result<(), ToolError> {
        let name = job
            .output_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.timeout_outputs.contains(&name) {
            return Err(ToolError::Timeout(Duration::from_secs(600)));
        }
        if self.fail_outputs.contains(&name) {
            return Err(ToolError::ExitStatus {
                code: Some(1),
                stderr: "RuntimeError: boom\n".to_string(),
            });
        }

        std::fs::write(&job.output_path, b"RIFF").unwrap();
        Ok(())
    }
}

/// Reporter keeping every event in order
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<BatchEvent>>,
}

impl EventRecorder {
    pub fn events(&self) -> Vec<BatchEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn retries(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, BatchEvent::RetryScheduled { .. }))
            .count()
    }

    /// `completed` values of every `ItemFinished`, in emission order
    pub fn progress(&self) -> Vec<usize> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                BatchEvent::ItemFinished { completed, .. } => Some(*completed),
                _ => None,
            })
            .collect()
    }
}

impl BatchReporter for EventRecorder {
    fn report(&self, event: BatchEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Harness with a recording reporter and a fresh cancellation token
pub fn test_harness(workers: usize) -> (BatchHarness, Arc<EventRecorder>, CancellationToken) {
    let recorder = Arc::new(EventRecorder::default());
    let cancel = CancellationToken::new();
    let ctx = BatchContext::new(recorder.clone(), cancel.clone());
    (BatchHarness::new(workers, ctx), recorder, cancel)
}

/// Default retry classes with a millisecond schedule
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Backoff {
            unit: Duration::from_millis(1),
            cap: Duration::from_millis(5),
        },
        RetryPolicy::default_retryable(),
    )
}

/// Write `bytes` to `dir/name` and return the path
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}
