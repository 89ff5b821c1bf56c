//! signprep - Main entry point
//!
//! Batch preprocessing for sign-language recognition datasets. Each
//! subcommand runs one path of the pipeline to completion; per-sample
//! failures are written to the failure report and never change the exit
//! status.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use signprep::services::{ExternalDetector, MediaConverter};
use signprep::workflow;
use signprep_common::config::LoggingConfig;
use signprep_common::{ConfigOverrides, PipelineConfig, TomlConfig};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for signprep
#[derive(Parser, Debug)]
#[command(name = "signprep")]
#[command(about = "Sign-language keypoint preprocessing pipeline")]
#[command(version)]
struct Args {
    /// Config file (overrides SIGNPREP_CONFIG and the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root directory holding raw inputs
    #[arg(long, global = true)]
    input_root: Option<PathBuf>,

    /// Root directory receiving archives or clips
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,

    /// Worker thread count (default: logical CPUs)
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Extra attempts for retryable failures
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Failure report path (default: failed.txt under the output root)
    #[arg(long, global = true)]
    failure_report: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert tabular landmark tables listed in a manifest into archives
    Tabular {
        /// CSV manifest with `path` and `sign` columns
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Extract keypoints from every video under the input root
    Video {
        /// Detector program (overrides [video.detector] program)
        #[arg(long)]
        detector: Option<PathBuf>,

        /// Argument passed to the detector before the video path (repeatable)
        #[arg(long = "detector-arg", allow_hyphen_values = true)]
        detector_args: Vec<String>,
    },

    /// Normalize raw downloads into per-instance clips
    Convert {
        /// JSON index of glosses and their video instances
        #[arg(long)]
        index: PathBuf,

        /// Directory holding raw downloads (overrides --input-root)
        #[arg(long)]
        raw_dir: Option<PathBuf>,
    },

    /// Check every archive under the output root
    Verify {
        /// Corrupt archive list (default: corrupt.txt under the output root)
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (mut toml_config, config_source) =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&toml_config.logging)?;

    info!("Starting signprep v{}", env!("CARGO_PKG_VERSION"));
    log_config_source(config_source.as_deref());

    let mut overrides = ConfigOverrides {
        input_root: args.input_root,
        output_root: args.output_root,
        worker_count: args.workers,
        retries: args.retries,
        failure_report: args.failure_report,
    };

    match args.command {
        Commands::Tabular { manifest } => {
            let config = resolve(&toml_config, overrides)?;
            workflow::run_tabular(&config, &manifest)
                .with_context(|| format!("Tabular run failed for manifest {}", manifest.display()))?;
        }
        Commands::Video {
            detector,
            detector_args,
        } => {
            let config = resolve(&toml_config, overrides)?;
            if detector.is_some() {
                toml_config.video.detector.program = detector;
            }
            if !detector_args.is_empty() {
                toml_config.video.detector.args = detector_args;
            }
            let detector = ExternalDetector::from_config(&toml_config.video.detector)
                .context("Failed to configure landmark detector")?;
            workflow::run_video(&config, &toml_config.video, &detector).context("Video run failed")?;
        }
        Commands::Convert { index, raw_dir } => {
            if raw_dir.is_some() {
                overrides.input_root = raw_dir;
            }
            let config = resolve(&toml_config, overrides)?;
            let converter = MediaConverter::from_config(&toml_config.convert);
            workflow::run_conversion(&config, &converter, &index)
                .with_context(|| format!("Conversion run failed for index {}", index.display()))?;
        }
        Commands::Verify { report } => {
            // The sweep only reads the output root
            if overrides.input_root.is_none() && toml_config.input_root.is_none() {
                overrides.input_root = overrides.output_root.clone().or_else(|| toml_config.output_root.clone());
            }
            let config = resolve(&toml_config, overrides)?;
            let result = workflow::run_verify(&config, report.as_deref()).context("Integrity sweep failed")?;
            info!(
                checked = result.checked,
                corrupt = result.corrupt.len(),
                "Verification finished"
            );
        }
    }

    Ok(())
}

fn log_config_source(source: Option<&Path>) {
    match source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No config file found, using built-in defaults"),
    }
}

fn resolve(toml_config: &TomlConfig, overrides: ConfigOverrides) -> Result<PipelineConfig> {
    let config = PipelineConfig::resolve(toml_config, overrides).context("Invalid configuration")?;
    info!(
        input_root = %config.input_root.display(),
        output_root = %config.output_root.display(),
        workers = config.worker_count,
        max_attempts = config.retry_policy.max_attempts,
        "Configuration resolved"
    );
    Ok(config)
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level. A configured log file gets a
/// second, non-ANSI layer in append mode.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}
