//! Run settings resolution
//!
//! **Priority:** CLI → TOML → compiled defaults
//!
//! [`Settings::from_toml`] fills every gap in the TOML file with defaults;
//! the binary then applies its flag overrides and calls
//! [`Settings::validate`] before any work starts.

use crate::error::{BatchError, BatchResult};
use crate::services::padding_engine::DEFAULT_TARGET_DURATION;
use crate::services::list_generator::{DEFAULT_LIST_LANGUAGE, DEFAULT_LIST_OUTPUT_DIR};
use crate::services::retry::{Backoff, ErrorClass, RetryPolicy};
use crate::services::variant_orchestrator::{validate_suffixes, SynthesisParams, DEFAULT_VARIANT_SUFFIXES};
use std::path::PathBuf;
use std::time::Duration;
use voxprep_common::config::TomlConfig;

pub const DEFAULT_PADDING_EXTENSIONS: [&str; 5] = ["wav", "mp3", "flac", "m4a", "ogg"];
pub const DEFAULT_LIST_EXTENSIONS: [&str; 3] = ["wav", "mp3", "flac"];
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 5000;
pub const DEFAULT_INTER_INVOCATION_DELAY_MS: u64 = 500;
pub const DEFAULT_PROBE_TIMEOUT_SECS: f64 = 30.0;
pub const DEFAULT_ENCODE_TIMEOUT_SECS: f64 = 300.0;
pub const DEFAULT_SYNTHESIS_TIMEOUT_SECS: f64 = 600.0;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: f64 = 5.0;

/// External measurement/encode tools
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub ffprobe: String,
    pub ffmpeg: String,
    pub probe_timeout: Option<Duration>,
    pub encode_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaddingSettings {
    pub target_duration: f64,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisSettings {
    pub params: SynthesisParams,
    pub variant_suffixes: Vec<String>,
    pub reference_extension: String,
    pub output_extension: String,
    pub output_dir: PathBuf,
    pub inter_invocation_delay: Duration,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListSettings {
    pub output_dir: PathBuf,
    pub language: String,
    pub extensions: Vec<String>,
}

/// Fully resolved run settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub log_directory: Option<PathBuf>,
    pub workers: usize,
    pub tools: ToolSettings,
    pub padding: PaddingSettings,
    pub retry: RetryPolicy,
    pub synthesis: SynthesisSettings,
    pub lists: ListSettings,
    /// How long in-flight external calls may run on after cancellation
    pub shutdown_grace: Duration,
}

impl Settings {
    /// Apply defaults to every field the TOML file leaves out
    pub fn from_toml(cfg: &TomlConfig) -> BatchResult<Self> {
        let retry = &cfg.retry;
        let max_attempts = retry.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(BatchError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        let retryable = match &retry.retryable {
            Some(names) => names
                .iter()
                .map(|n| n.parse::<ErrorClass>().map_err(BatchError::Config))
                .collect::<BatchResult<Vec<_>>>()?,
            None => RetryPolicy::default_retryable(),
        };
        let backoff = Backoff {
            unit: Duration::from_millis(retry.backoff_unit_ms.unwrap_or(DEFAULT_BACKOFF_UNIT_MS)),
            cap: Duration::from_millis(retry.backoff_cap_ms.unwrap_or(DEFAULT_BACKOFF_CAP_MS)),
        };

        let syn = &cfg.synthesis;
        let defaults = SynthesisParams::default();
        let params = SynthesisParams {
            program: syn.program.clone().unwrap_or(defaults.program),
            script: syn.script.clone().unwrap_or(defaults.script),
            gpt_model_path: syn.gpt_model_path.clone().unwrap_or(defaults.gpt_model_path),
            sovits_model_path: syn.sovits_model_path.clone().unwrap_or(defaults.sovits_model_path),
            language: syn.language.clone().unwrap_or(defaults.language),
            steps: syn.steps.unwrap_or(defaults.steps),
            speed: syn.speed.unwrap_or(defaults.speed),
            pause_time: syn.pause_time.unwrap_or(defaults.pause_time),
            top_k: syn.top_k.unwrap_or(defaults.top_k),
            top_p: syn.top_p.unwrap_or(defaults.top_p),
            temperature: syn.temperature.unwrap_or(defaults.temperature),
        };

        let settings = Self {
            log_level: cfg.logging.level.clone().unwrap_or_else(|| "info".to_string()),
            log_file: cfg.logging.file.clone(),
            log_directory: cfg.logging.directory.clone(),
            workers: cfg.workers.count.unwrap_or(1),
            tools: ToolSettings {
                ffprobe: cfg.tools.ffprobe.clone().unwrap_or_else(|| "ffprobe".to_string()),
                ffmpeg: cfg.tools.ffmpeg.clone().unwrap_or_else(|| "ffmpeg".to_string()),
                probe_timeout: timeout_from_secs(
                    "tools.probe_timeout_secs",
                    cfg.tools.probe_timeout_secs.unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
                )?,
                encode_timeout: timeout_from_secs(
                    "tools.encode_timeout_secs",
                    cfg.tools.encode_timeout_secs.unwrap_or(DEFAULT_ENCODE_TIMEOUT_SECS),
                )?,
            },
            padding: PaddingSettings {
                target_duration: cfg.padding.target_duration_secs.unwrap_or(DEFAULT_TARGET_DURATION),
                extensions: cfg
                    .padding
                    .extensions
                    .clone()
                    .unwrap_or_else(|| owned(&DEFAULT_PADDING_EXTENSIONS)),
            },
            retry: RetryPolicy::new(max_attempts, backoff, retryable),
            synthesis: SynthesisSettings {
                params,
                variant_suffixes: syn
                    .variant_suffixes
                    .clone()
                    .unwrap_or_else(|| owned(&DEFAULT_VARIANT_SUFFIXES)),
                reference_extension: syn.reference_extension.clone().unwrap_or_else(|| "wav".to_string()),
                output_extension: syn.output_extension.clone().unwrap_or_else(|| "wav".to_string()),
                output_dir: syn.output_dir.clone().unwrap_or_else(|| PathBuf::from("export")),
                inter_invocation_delay: Duration::from_millis(
                    syn.inter_invocation_delay_ms.unwrap_or(DEFAULT_INTER_INVOCATION_DELAY_MS),
                ),
                timeout: timeout_from_secs(
                    "synthesis.timeout_secs",
                    syn.timeout_secs.unwrap_or(DEFAULT_SYNTHESIS_TIMEOUT_SECS),
                )?,
            },
            lists: ListSettings {
                output_dir: cfg
                    .lists
                    .output_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LIST_OUTPUT_DIR)),
                language: cfg
                    .lists
                    .language
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LIST_LANGUAGE.to_string()),
                extensions: cfg
                    .lists
                    .extensions
                    .clone()
                    .unwrap_or_else(|| owned(&DEFAULT_LIST_EXTENSIONS)),
            },
            shutdown_grace: timeout_from_secs(
                "shutdown.grace_secs",
                cfg.shutdown.grace_secs.unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            )?
            .unwrap_or(Duration::ZERO),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values no run can work with
    pub fn validate(&self) -> BatchResult<()> {
        if !(self.padding.target_duration.is_finite() && self.padding.target_duration > 0.0) {
            return Err(BatchError::Config(format!(
                "target duration must be a positive number of seconds, got {}",
                self.padding.target_duration
            )));
        }
        if self.padding.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(BatchError::Config("no padding extensions configured".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(BatchError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        validate_suffixes(&self.synthesis.variant_suffixes)?;
        Ok(())
    }
}

/// Seconds → optional deadline; `0` disables the deadline
pub fn timeout_from_secs(field: &str, secs: f64) -> BatchResult<Option<Duration>> {
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|_| BatchError::Config(format!("{} must be a non-negative number, got {}", field, secs)))
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_config() {
        let settings = Settings::from_toml(&TomlConfig::default()).unwrap();

        assert_eq!(settings.workers, 1);
        assert_eq!(settings.padding.target_duration, 3.1);
        assert_eq!(settings.padding.extensions, vec!["wav", "mp3", "flac", "m4a", "ogg"]);
        assert_eq!(settings.retry, RetryPolicy::default());
        assert_eq!(settings.synthesis.variant_suffixes, vec!["_a", "_b", "_c", "_d"]);
        assert_eq!(settings.synthesis.output_dir, PathBuf::from("export"));
        assert_eq!(settings.synthesis.inter_invocation_delay, Duration::from_millis(500));
        assert_eq!(settings.synthesis.params, SynthesisParams::default());
        assert_eq!(settings.lists.language, "JA");
        assert_eq!(settings.tools.probe_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_toml_values_override_defaults() {
        let cfg = TomlConfig::from_toml_str(
            r#"
            [workers]
            count = 4

            [padding]
            target_duration_secs = 2.5

            [retry]
            max_attempts = 3
            retryable = ["busy"]

            [synthesis]
            variant_suffixes = ["_x", "_y"]
            steps = 16

            [tools]
            encode_timeout_secs = 0
            "#,
        )
        .unwrap();
        let settings = Settings::from_toml(&cfg).unwrap();

        assert_eq!(settings.workers, 4);
        assert_eq!(settings.padding.target_duration, 2.5);
        assert_eq!(settings.retry.max_attempts, 3);
        assert!(!settings
            .retry
            .is_retryable(&std::io::Error::new(std::io::ErrorKind::PermissionDenied, "x")));
        assert_eq!(settings.synthesis.variant_suffixes, vec!["_x", "_y"]);
        assert_eq!(settings.synthesis.params.steps, 16);
        assert_eq!(settings.tools.encode_timeout, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            "[retry]\nmax_attempts = 0",
            "[retry]\nretryable = [\"sometimes\"]",
            "[padding]\ntarget_duration_secs = 0.0",
            "[padding]\ntarget_duration_secs = -1.0",
            "[synthesis]\nvariant_suffixes = []",
            "[synthesis]\nvariant_suffixes = [\"_a\", \"_a\"]",
            "[tools]\nprobe_timeout_secs = -5.0",
        ];
        for case in cases {
            let cfg = TomlConfig::from_toml_str(case).unwrap();
            assert!(
                matches!(Settings::from_toml(&cfg), Err(BatchError::Config(_))),
                "expected config error for {:?}",
                case
            );
        }
    }
}
