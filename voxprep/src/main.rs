//! voxprep - batch preparation for speech synthesis datasets
//!
//! Subcommands:
//! - `pad`: append trailing silence so every clip reaches a minimum duration
//! - `synthesize`: pair a corpus with reference clips and render every variant
//! - `list`: write the training list file for one speaker directory
//!
//! Exit status: 0 clean, 1 item failures or cancelled, 2 fatal error.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use voxprep::config::{timeout_from_secs, Settings};
use voxprep::services::{
    CommandSynthesizer, DurationProbe, FfmpegTool, FileScanner, FsReplacer, ListGenerator,
    PaddingEngine, PairingEngine, ProcessRunner, VariantOrchestrator,
};
use voxprep::workflow::{spawn_stdout_forwarder, BatchContext, BatchHarness, TracingReporter};
use voxprep_common::events::FanoutReporter;
use voxprep_common::{BatchReporter, BatchSummary, EventBus};

/// Command-line arguments for voxprep
#[derive(Parser, Debug)]
#[command(name = "voxprep")]
#[command(about = "Batch silence padding and multi-variant synthesis for TTS datasets")]
#[command(version)]
struct Args {
    /// Configuration file (default: platform config dir, or VOXPREP_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Jobs processed concurrently (1 = sequential)
    #[arg(short, long, global = true, env = "VOXPREP_WORKERS")]
    workers: Option<usize>,

    /// Print every batch event as one JSON line on stdout
    #[arg(long, global = true)]
    events_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pad every clip under ROOT to the target duration
    Pad {
        root: PathBuf,

        /// Minimum duration in seconds
        #[arg(long, env = "VOXPREP_TARGET_SECS")]
        target: Option<f64>,

        /// Recognized extension (repeatable); replaces the configured set
        #[arg(long = "ext", value_name = "EXT")]
        extensions: Vec<String>,
    },

    /// Synthesize every variant for each corpus line / reference clip pair
    Synthesize {
        corpus: PathBuf,
        reference_dir: PathBuf,

        #[arg(long, env = "VOXPREP_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// Minimum delay between synthesis starts
        #[arg(long, value_name = "MS")]
        delay_ms: Option<u64>,

        /// Per-invocation deadline (0 disables)
        #[arg(long, value_name = "S")]
        timeout_secs: Option<f64>,
    },

    /// Write `<speaker>.list` for the clips in AUDIO_DIR
    List {
        audio_dir: PathBuf,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Language tag written into each line
        #[arg(long)]
        language: Option<String>,
    },
}

impl Command {
    /// Prefix for per-run log file names
    fn log_name(&self) -> &'static str {
        match self {
            Command::Pad { .. } => "audio_padding",
            Command::Synthesize { .. } => "batch_inference",
            Command::List { .. } => "create_lists",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Run aborted");
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let toml_config = voxprep_common::config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    let mut settings = Settings::from_toml(&toml_config).context("Invalid configuration")?;
    apply_overrides(&mut settings, &args)?;
    settings.validate().context("Invalid configuration")?;

    let log_path = init_logging(&settings, args.command.log_name())?;

    info!("Starting voxprep {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &log_path {
        info!(log_file = %path.display(), "Logging to file");
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let bus = EventBus::new(1024);
    let forwarder = args.events_json.then(|| spawn_stdout_forwarder(&bus));

    let mut sinks: Vec<Arc<dyn BatchReporter>> = vec![Arc::new(TracingReporter)];
    if args.events_json {
        sinks.push(Arc::new(bus.clone()));
    }
    drop(bus);

    // The harness owns the last bus handle; dropping it ends the forwarder
    let summary = {
        let ctx = BatchContext::new(Arc::new(FanoutReporter::new(sinks)), cancel.clone());
        let harness = BatchHarness::new(settings.workers, ctx);
        execute(args.command, &settings, &harness, &cancel).await
    };

    if let Some(handle) = forwarder {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Event forwarder task failed");
        }
    }

    let Some((summary, lines)) = summary? else {
        return Ok(ExitCode::SUCCESS);
    };

    for line in &lines {
        if args.events_json {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    Ok(if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Run one subcommand; batch commands return their summary and rendered lines
async fn execute(
    command: Command,
    settings: &Settings,
    harness: &BatchHarness,
    cancel: &CancellationToken,
) -> Result<Option<(BatchSummary, Vec<String>)>> {
    let runner = ProcessRunner::new(cancel.clone(), settings.shutdown_grace);

    match command {
        Command::Pad { root, .. } => {
            let probe = DurationProbe::new(
                settings.tools.ffprobe.clone(),
                runner.clone(),
                settings.tools.probe_timeout,
            );
            let tool = FfmpegTool::new(
                probe,
                settings.tools.ffmpeg.clone(),
                runner,
                settings.tools.encode_timeout,
            );
            let engine = PaddingEngine::new(
                Arc::new(tool),
                Arc::new(FsReplacer),
                settings.retry.clone(),
                settings.padding.target_duration,
            );
            let scanner = FileScanner::new(&settings.padding.extensions);

            let report = engine
                .run(&root, &scanner, harness)
                .await
                .with_context(|| format!("Padding run failed for {}", root.display()))?;
            let lines = report.summary.render(report.kind);
            Ok(Some((report.summary, lines)))
        }
        Command::Synthesize {
            corpus,
            reference_dir,
            ..
        } => {
            let syn = &settings.synthesis;
            let synthesizer = CommandSynthesizer::new(syn.params.clone(), runner, syn.timeout);
            let orchestrator = VariantOrchestrator::new(
                Arc::new(synthesizer),
                PairingEngine::new(&syn.reference_extension),
                syn.variant_suffixes.clone(),
                syn.output_dir.clone(),
                &syn.output_extension,
                syn.inter_invocation_delay,
            )?;

            let report = orchestrator
                .run(&corpus, &reference_dir, harness)
                .await
                .context("Synthesis run failed")?;
            let lines = report.summary.render(report.kind);
            Ok(Some((report.summary, lines)))
        }
        Command::List { audio_dir, .. } => {
            let generator = ListGenerator::new(
                &settings.lists.extensions,
                &settings.lists.language,
                settings.lists.output_dir.clone(),
            );
            let report = generator
                .generate(&audio_dir)
                .await
                .with_context(|| format!("List generation failed for {}", audio_dir.display()))?;
            println!("{} ({} lines)", report.path.display(), report.lines);
            Ok(None)
        }
    }
}

/// CLI flags win over the TOML file
fn apply_overrides(settings: &mut Settings, args: &Args) -> Result<()> {
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }

    match &args.command {
        Command::Pad {
            target, extensions, ..
        } => {
            if let Some(target) = target {
                settings.padding.target_duration = *target;
            }
            if !extensions.is_empty() {
                settings.padding.extensions = extensions.clone();
            }
        }
        Command::Synthesize {
            output_dir,
            delay_ms,
            timeout_secs,
            ..
        } => {
            if let Some(dir) = output_dir {
                settings.synthesis.output_dir = dir.clone();
            }
            if let Some(ms) = delay_ms {
                settings.synthesis.inter_invocation_delay = Duration::from_millis(*ms);
            }
            if let Some(secs) = timeout_secs {
                settings.synthesis.timeout = timeout_from_secs("--timeout-secs", *secs)?;
            }
        }
        Command::List {
            output_dir,
            language,
            ..
        } => {
            if let Some(dir) = output_dir {
                settings.lists.output_dir = dir.clone();
            }
            if let Some(language) = language {
                settings.lists.language = language.clone();
            }
        }
    }
    Ok(())
}

/// Install the subscriber: stderr always, plus a plain-text file when configured
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(settings: &Settings, log_name: &str) -> Result<Option<PathBuf>> {
    let level = &settings.log_level;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("voxprep={level},voxprep_common={level}").into());

    let log_path = match (&settings.log_file, &settings.log_directory) {
        (Some(file), _) => Some(file.clone()),
        (None, Some(dir)) => Some(dir.join(format!(
            "{}_{}.log",
            log_name,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ))),
        (None, None) => None,
    };

    let file_layer = match &log_path {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(log_path)
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Resolves on Ctrl+C (or SIGTERM on unix)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling run");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling run");
        },
    }
}
