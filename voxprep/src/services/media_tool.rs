//! Seams between the padding engine and the outside world
//!
//! [`MediaTool`] measures and encodes, [`FileReplacer`] moves the padded
//! side-file over the original. Production uses [`FfmpegTool`] and
//! [`FsReplacer`]; tests substitute in-process fakes.

use super::duration_probe::DurationProbe;
use super::process_runner::ProcessRunner;
use crate::error::ToolError;
use crate::models::{DurationMeasurement, MediaFile};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::time::Duration;

/// External measurement and encode operations
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Measure playback duration; never fails, see [`DurationMeasurement`]
    async fn measure(&self, file: &MediaFile) -> DurationMeasurement;

    /// Write `input` plus `silence_secs` of trailing silence to `output`,
    /// keeping the original codec
    async fn pad_with_silence(
        &self,
        input: &Path,
        silence_secs: f64,
        output: &Path,
    ) -> Result<(), ToolError>;
}

/// Replace step: move `from` over `to`
#[async_trait]
pub trait FileReplacer: Send + Sync {
    async fn replace(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Rename-based replacer
///
/// A rename within one directory is atomic on every supported platform;
/// readers observe either the old or the new file, never a partial one.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReplacer;

#[async_trait]
impl FileReplacer for FsReplacer {
    async fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }
}

/// ffprobe + ffmpeg backed media tool
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    probe: DurationProbe,
    ffmpeg: String,
    runner: ProcessRunner,
    encode_timeout: Option<Duration>,
}

impl FfmpegTool {
    pub fn new(
        probe: DurationProbe,
        ffmpeg: impl Into<String>,
        runner: ProcessRunner,
        encode_timeout: Option<Duration>,
    ) -> Self {
        Self {
            probe,
            ffmpeg: ffmpeg.into(),
            runner,
            encode_timeout,
        }
    }

    /// `-y -i <input> -af apad=pad_dur=<silence> -c:a copy <output>`
    pub fn encode_args(input: &Path, silence_secs: f64, output: &Path) -> Vec<OsString> {
        vec![
            OsString::from("-y"),
            OsString::from("-i"),
            input.as_os_str().to_os_string(),
            OsString::from("-af"),
            OsString::from(format!("apad=pad_dur={}", format_seconds(silence_secs))),
            OsString::from("-c:a"),
            OsString::from("copy"),
            output.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn measure(&self, file: &MediaFile) -> DurationMeasurement {
        self.probe.measure(file).await
    }

    async fn pad_with_silence(
        &self,
        input: &Path,
        silence_secs: f64,
        output: &Path,
    ) -> Result<(), ToolError> {
        self.runner
            .run_checked(
                &self.ffmpeg,
                Self::encode_args(input, silence_secs, output),
                self.encode_timeout,
            )
            .await
            .map(|_| ())
    }
}

/// Seconds rounded *up* to the millisecond, so padding never undershoots
pub fn format_seconds(seconds: f64) -> String {
    let millis = (seconds * 1000.0).ceil().max(0.0);
    format!("{:.3}", millis / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seconds_rounds_up() {
        assert_eq!(format_seconds(2.1), "2.100");
        assert_eq!(format_seconds(0.00001), "0.001");
        assert_eq!(format_seconds(1.2344), "1.235");
        assert_eq!(format_seconds(0.0), "0.000");
    }

    #[test]
    fn test_encode_args_shape() {
        let args = FfmpegTool::encode_args(
            Path::new("/clips/a.wav"),
            2.1,
            Path::new("/clips/a.voxprep-pad.wav"),
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/clips/a.wav",
                "-af",
                "apad=pad_dur=2.100",
                "-c:a",
                "copy",
                "/clips/a.voxprep-pad.wav",
            ]
        );
    }

    #[tokio::test]
    async fn test_fs_replacer_overwrites_target() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let from = temp_dir.path().join("new.wav");
        let to = temp_dir.path().join("old.wav");
        std::fs::write(&from, b"padded").unwrap();
        std::fs::write(&to, b"original").unwrap();

        FsReplacer.replace(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"padded");
    }
}
