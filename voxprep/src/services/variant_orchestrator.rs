//! Variant orchestrator
//!
//! Expands validated pairs into one [`SynthesisJob`] per `(pair, suffix)` and
//! dispatches them through the batch harness. A failed job is recorded and
//! the batch moves on; only pairing errors abort the run. With a non-zero
//! inter-invocation delay, calls run one at a time with that pause between
//! the end of one call and the start of the next.

use super::pairing_engine::PairingEngine;
use super::process_runner::ProcessRunner;
use super::rate_limiter::RateLimiter;
use crate::error::{BatchError, BatchResult, ToolError};
use crate::models::{FailureReason, SynthesisJob, SynthesisPair};
use crate::workflow::harness::{BatchContext, BatchHarness, BatchReport};
use async_trait::async_trait;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use voxprep_common::BatchKind;

/// Default variant labels, one output per label
pub const DEFAULT_VARIANT_SUFFIXES: [&str; 4] = ["_a", "_b", "_c", "_d"];

/// One synthesis invocation
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Produce `job.output_path`; `Ok` only on a zero exit
    async fn synthesize(&self, job: &SynthesisJob) -> Result<(), ToolError>;
}

/// Fixed parameters of the synthesis command line
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    pub program: String,
    /// Script passed before the named arguments; skipped when empty
    pub script: String,
    pub gpt_model_path: String,
    pub sovits_model_path: String,
    pub language: String,
    pub steps: u32,
    pub speed: f64,
    pub pause_time: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub temperature: f64,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            script: "GPT_SoVITS/inference.py".to_string(),
            gpt_model_path: "GPT_weights/your_gpt_model.ckpt".to_string(),
            sovits_model_path: "SoVITS_weights/your_sovits_model.pth".to_string(),
            language: "ja".to_string(),
            steps: 32,
            speed: 1.0,
            pause_time: 0.3,
            top_k: 15,
            top_p: 1.0,
            temperature: 1.0,
        }
    }
}

/// Synthesizer backed by an external command
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    params: SynthesisParams,
    runner: ProcessRunner,
    timeout: Option<Duration>,
}

impl CommandSynthesizer {
    pub fn new(params: SynthesisParams, runner: ProcessRunner, timeout: Option<Duration>) -> Self {
        Self {
            params,
            runner,
            timeout,
        }
    }

    /// Argument list for one job
    pub fn args(&self, job: &SynthesisJob) -> Vec<OsString> {
        let p = &self.params;
        let mut args: Vec<OsString> = Vec::with_capacity(27);
        if !p.script.is_empty() {
            args.push(p.script.clone().into());
        }

        let named: [(&str, OsString); 13] = [
            ("--text", job.pair.text.text.clone().into()),
            ("--reference_audio", job.pair.reference.file.clone().into_os_string()),
            ("--reference_text", job.pair.reference.derived_label.clone().into()),
            ("--language", p.language.clone().into()),
            ("--gpt_model_path", p.gpt_model_path.clone().into()),
            ("--sovits_model_path", p.sovits_model_path.clone().into()),
            ("--output_path", job.output_path.clone().into_os_string()),
            ("--steps", p.steps.to_string().into()),
            ("--speed", p.speed.to_string().into()),
            ("--pause_time", p.pause_time.to_string().into()),
            ("--top_k", p.top_k.to_string().into()),
            ("--top_p", p.top_p.to_string().into()),
            ("--temperature", p.temperature.to_string().into()),
        ];
        for (flag, value) in named {
            args.push(flag.into());
            args.push(value);
        }
        args
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn synthesize(&self, job: &SynthesisJob) -> Result<(), ToolError> {
        self.runner
            .run_checked(&self.params.program, self.args(job), self.timeout)
            .await
            .map(|_| ())
    }
}

/// Drives the synthesis pipeline for one corpus / reference directory
pub struct VariantOrchestrator {
    synthesizer: Arc<dyn Synthesizer>,
    pairing: PairingEngine,
    suffixes: Vec<String>,
    output_dir: PathBuf,
    output_extension: String,
    limiter: RateLimiter,
}

impl VariantOrchestrator {
    /// Fails with `Config` on an empty or duplicated suffix set
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        pairing: PairingEngine,
        suffixes: Vec<String>,
        output_dir: PathBuf,
        output_extension: &str,
        min_interval: Duration,
    ) -> BatchResult<Self> {
        validate_suffixes(&suffixes)?;
        Ok(Self {
            synthesizer,
            pairing,
            suffixes,
            output_dir,
            output_extension: output_extension.trim_start_matches('.').to_string(),
            limiter: RateLimiter::new(min_interval),
        })
    }

    /// `<output_dir>/<reference stem><suffix>.<ext>`
    pub fn output_path(&self, pair: &SynthesisPair, suffix: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{}{}.{}",
            pair.reference.stem(),
            suffix,
            self.output_extension
        ))
    }

    /// Pairs × suffixes, pair-major, suffixes in configured order
    pub fn build_jobs(&self, pairs: &[SynthesisPair]) -> Vec<SynthesisJob> {
        pairs
            .iter()
            .flat_map(|pair| {
                self.suffixes
                    .iter()
                    .map(move |suffix| SynthesisJob::new(pair.clone(), suffix, self.output_path(pair, suffix)))
            })
            .collect()
    }

    /// Validate and pair inputs, then dispatch every job
    ///
    /// The output directory is created only after pairing succeeded.
    pub async fn run(
        &self,
        corpus: &Path,
        reference_dir: &Path,
        harness: &BatchHarness,
    ) -> BatchResult<BatchReport<SynthesisJob>> {
        let pairs = self.pairing.pair(corpus, reference_dir).await?;
        let jobs = self.build_jobs(&pairs);

        tokio::fs::create_dir_all(&self.output_dir).await?;

        tracing::info!(
            run_id = %harness.context().run_id,
            pairs = pairs.len(),
            variants = self.suffixes.len(),
            jobs = jobs.len(),
            delay_ms = self.limiter.min_interval().as_millis() as u64,
            output_dir = %self.output_dir.display(),
            "Synthesis jobs prepared"
        );

        let ctx = harness.context();
        Ok(harness
            .run(BatchKind::Synthesis, jobs, |job| self.process(job, ctx))
            .await)
    }

    /// Run one synthesis job to a terminal status
    pub async fn process(&self, mut job: SynthesisJob, ctx: &BatchContext) -> SynthesisJob {
        // Held until the call returns; the next start waits from there
        let Some(_permit) = self.limiter.acquire(&ctx.cancel).await else {
            job.fail(FailureReason::Cancelled);
            return job;
        };

        tracing::info!(
            run_id = %ctx.run_id,
            text = %job.pair.text.text,
            variant = %job.variant_suffix,
            output = %job.output_path.display(),
            "Synthesizing"
        );

        match self.synthesizer.synthesize(&job).await {
            Ok(()) => {
                tracing::info!(
                    run_id = %ctx.run_id,
                    text = %job.pair.text.text,
                    variant = %job.variant_suffix,
                    "Synthesis succeeded"
                );
                job.succeed();
            }
            Err(e) => {
                tracing::error!(
                    run_id = %ctx.run_id,
                    text = %job.pair.text.text,
                    variant = %job.variant_suffix,
                    error = %e,
                    "Synthesis failed"
                );
                job.fail(failure_reason(e));
            }
        }
        job
    }
}

fn failure_reason(err: ToolError) -> FailureReason {
    match err {
        ToolError::ExitStatus { code, stderr } => FailureReason::SynthesisFailure {
            exit_code: code,
            detail: stderr,
        },
        ToolError::Timeout(limit) => FailureReason::Timeout(limit),
        ToolError::Cancelled => FailureReason::Cancelled,
        other => FailureReason::SynthesisFailure {
            exit_code: None,
            detail: other.to_string(),
        },
    }
}

/// Suffix set must be non-empty and free of duplicates
pub fn validate_suffixes(suffixes: &[String]) -> BatchResult<()> {
    if suffixes.is_empty() {
        return Err(BatchError::Config("variant suffix set is empty".to_string()));
    }
    let mut seen = HashSet::new();
    for suffix in suffixes {
        if !seen.insert(suffix.as_str()) {
            return Err(BatchError::Config(format!(
                "duplicate variant suffix '{}'",
                suffix
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReferenceAudio, TextEntry};
    use tokio_util::sync::CancellationToken;

    fn pair(index: usize, text: &str, file: &str) -> SynthesisPair {
        SynthesisPair {
            text: TextEntry {
                index,
                text: text.to_string(),
            },
            reference: ReferenceAudio::new(index, PathBuf::from(file)),
        }
    }

    #[test]
    fn test_command_args_contract() {
        let synth = CommandSynthesizer::new(
            SynthesisParams::default(),
            ProcessRunner::new(CancellationToken::new(), Duration::ZERO),
            None,
        );
        let job = SynthesisJob::new(
            pair(0, "こんにちは", "/refs/spk_hello.wav"),
            "_a",
            PathBuf::from("export/spk_hello_a.wav"),
        );

        let args: Vec<String> = synth
            .args(&job)
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "GPT_SoVITS/inference.py",
                "--text", "こんにちは",
                "--reference_audio", "/refs/spk_hello.wav",
                "--reference_text", "hello",
                "--language", "ja",
                "--gpt_model_path", "GPT_weights/your_gpt_model.ckpt",
                "--sovits_model_path", "SoVITS_weights/your_sovits_model.pth",
                "--output_path", "export/spk_hello_a.wav",
                "--steps", "32",
                "--speed", "1",
                "--pause_time", "0.3",
                "--top_k", "15",
                "--top_p", "1",
                "--temperature", "1",
            ]
        );
    }

    #[test]
    fn test_empty_script_is_omitted() {
        let params = SynthesisParams {
            script: String::new(),
            ..SynthesisParams::default()
        };
        let synth = CommandSynthesizer::new(
            params,
            ProcessRunner::new(CancellationToken::new(), Duration::ZERO),
            None,
        );
        let job = SynthesisJob::new(pair(0, "t", "/r/a.wav"), "_a", PathBuf::from("o.wav"));
        assert_eq!(synth.args(&job)[0], OsString::from("--text"));
    }

    #[test]
    fn test_suffix_validation() {
        assert!(validate_suffixes(&[]).is_err());
        assert!(validate_suffixes(&["_a".into(), "_a".into()]).is_err());
        assert!(validate_suffixes(&["_a".into(), "_b".into()]).is_ok());
    }

    #[test]
    fn test_failure_reason_mapping() {
        let reason = failure_reason(ToolError::ExitStatus {
            code: Some(2),
            stderr: "boom".into(),
        });
        assert_eq!(
            reason,
            FailureReason::SynthesisFailure {
                exit_code: Some(2),
                detail: "boom".into()
            }
        );
        assert_eq!(
            failure_reason(ToolError::Timeout(Duration::from_secs(3))),
            FailureReason::Timeout(Duration::from_secs(3))
        );
    }
}
