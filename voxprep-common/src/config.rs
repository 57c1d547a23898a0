//! Configuration loading and config file resolution
//!
//! Every field of the TOML file is optional. Missing sections fall back to the
//! compiled defaults applied by the consuming crate, so an empty (or absent)
//! file is a valid configuration.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VOXPREP_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Worker pool sizing
    pub workers: WorkersConfig,
    /// External measurement/encode tools
    pub tools: ToolsConfig,
    /// Silence padding batch
    pub padding: PaddingConfig,
    /// Replace-step retry policy
    pub retry: RetryConfig,
    /// Multi-variant synthesis batch
    pub synthesis: SynthesisConfig,
    /// Training list generation
    pub lists: ListsConfig,
    /// Cancellation behaviour
    pub shutdown: ShutdownConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,

    /// Log file path (optional, logs to stderr only if not specified)
    pub file: Option<PathBuf>,

    /// Directory receiving one timestamped log file per run
    ///
    /// Ignored when `file` is set.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Number of jobs processed concurrently (1 = sequential)
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Duration measurement executable (ffprobe)
    pub ffprobe: Option<String>,
    /// Encode executable (ffmpeg)
    pub ffmpeg: Option<String>,
    pub probe_timeout_secs: Option<f64>,
    pub encode_timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaddingConfig {
    /// Minimum clip duration in seconds
    pub target_duration_secs: Option<f64>,
    /// Recognized audio extensions, without the leading dot
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub backoff_unit_ms: Option<u64>,
    pub backoff_cap_ms: Option<u64>,
    /// Error classes treated as transient lock contention
    ///
    /// Recognized: `permission_denied`, `busy`, `would_block`, `interrupted`, `other`.
    pub retryable: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Interpreter or executable launched per job
    pub program: Option<String>,
    /// Script passed as the first argument (omitted when empty)
    pub script: Option<String>,
    pub gpt_model_path: Option<String>,
    pub sovits_model_path: Option<String>,
    pub language: Option<String>,
    pub steps: Option<u32>,
    pub speed: Option<f64>,
    pub pause_time: Option<f64>,
    pub top_k: Option<u32>,
    pub top_p: Option<f64>,
    pub temperature: Option<f64>,
    pub variant_suffixes: Option<Vec<String>>,
    pub reference_extension: Option<String>,
    pub output_extension: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub inter_invocation_delay_ms: Option<u64>,
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListsConfig {
    pub output_dir: Option<PathBuf>,
    pub language: Option<String>,
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Seconds in-flight external calls may keep running after cancellation
    pub grace_secs: Option<f64>,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from an existing file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }
}

/// Config file resolution, priority order:
/// 1. Command-line argument (highest priority)
/// 2. `VOXPREP_CONFIG` environment variable
/// 3. Platform config directory (`~/.config/voxprep/config.toml` on Linux)
///
/// Returns `None` when no candidate is known.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform default
    default_config_path()
}

/// Platform default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("voxprep").join("config.toml"))
}

/// Load configuration with graceful degradation
///
/// A missing file logs a warning and yields defaults. A file that exists but
/// cannot be read or parsed is a `Config` error.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        warn!("No config directory available on this platform, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        if cli_arg.is_some() {
            return Err(Error::NotFound(format!(
                "Config file {}",
                path.display()
            )));
        }
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(TomlConfig::default());
    }

    info!(path = %path.display(), "Loading configuration");
    TomlConfig::from_file(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.padding.target_duration_secs.is_none());
        assert!(config.synthesis.variant_suffixes.is_none());
        assert!(config.logging.level.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = TomlConfig::from_toml_str(
            r#"
            [padding]
            target_duration_secs = 2.5

            [retry]
            max_attempts = 3
            retryable = ["busy"]
            "#,
        )
        .unwrap();

        assert_eq!(config.padding.target_duration_secs, Some(2.5));
        assert!(config.padding.extensions.is_none());
        assert_eq!(config.retry.max_attempts, Some(3));
        assert_eq!(config.retry.retryable, Some(vec!["busy".to_string()]));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = TomlConfig::from_toml_str("[padding\ntarget = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_cli_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/explicit.toml")));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.toml")));
    }
}
