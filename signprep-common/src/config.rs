//! Configuration loading and config file resolution
//!
//! Two layers:
//! 1. **TOML bootstrap file**: roots, worker count, retry policy, logging,
//!    detector and media tool settings
//! 2. **Command-line overrides**: applied on top of the file values
//!
//! # Config file priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`SIGNPREP_CONFIG`)
//! 3. `<user config dir>/signprep/config.toml`
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SIGNPREP_CONFIG";

/// Default failure report file name, placed under the output root
pub const DEFAULT_FAILURE_REPORT: &str = "failed.txt";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional in the file. Roots have no default and must
/// come from either the file or the command line.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Root containing raw inputs (landmark tables or videos)
    #[serde(default)]
    pub input_root: Option<PathBuf>,

    /// Root receiving converted artifacts
    #[serde(default)]
    pub output_root: Option<PathBuf>,

    /// Fixed worker pool size (defaults to the number of logical CPUs)
    #[serde(default)]
    pub worker_count: Option<usize>,

    /// Failure report path (defaults to `failed.txt` under the output root)
    #[serde(default)]
    pub failure_report: Option<PathBuf>,

    /// Retry policy for external conversion steps
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Video keypoint extraction settings
    #[serde(default)]
    pub video: VideoConfig,

    /// Media conversion settings
    #[serde(default)]
    pub convert: ConvertConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Bounded retry for steps that may fail transiently
///
/// `max_attempts` counts the first attempt, so `1` means no retry.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Policy that runs each step exactly once
    pub fn no_retry() -> Self {
        Self { max_attempts: 1 }
    }

    /// Policy allowing `retries` additional attempts after the first
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// Video keypoint extraction settings
#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    /// File extensions (without dot, case-insensitive) treated as videos
    #[serde(default = "default_video_extensions")]
    pub extensions: Vec<String>,

    /// External landmark detector
    #[serde(default)]
    pub detector: DetectorConfig,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            extensions: default_video_extensions(),
            detector: DetectorConfig::default(),
        }
    }
}

/// External landmark detector command
///
/// The video path is appended as the final argument.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DetectorConfig {
    #[serde(default)]
    pub program: Option<PathBuf>,

    #[serde(default)]
    pub args: Vec<String>,
}

/// Media conversion settings
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertConfig {
    /// Media tool executable
    #[serde(default = "default_convert_program")]
    pub program: PathBuf,

    /// Frame rate used to turn frame bounds into timestamps
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Raw source extensions probed in order
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            program: default_convert_program(),
            fps: default_fps(),
            source_extensions: default_source_extensions(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    1
}

fn default_video_extensions() -> Vec<String> {
    vec!["mp4".to_string()]
}

fn default_convert_program() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_fps() -> u32 {
    25
}

fn default_source_extensions() -> Vec<String> {
    ["mp4", "mkv", "swf", "avi", "webm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Number of logical CPUs, never less than one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl TomlConfig {
    /// Load configuration following the config file priority order
    ///
    /// An explicitly named file (CLI or environment) must exist; the user
    /// config file is optional and falls back to built-in defaults. Also
    /// returns the file that was read, so the caller can report it once
    /// logging is up.
    pub fn load(cli_path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match resolve_config_path(cli_path)? {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML {}: {}", path.display(), e)))?;
        debug!("Parsed configuration from {}", path.display());
        Ok(config)
    }
}

/// Resolve which config file to read, if any
pub fn resolve_config_path(cli_path: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        if !path.exists() {
            return Err(Error::Config(format!("Config file not found: {}", path.display())));
        }
        return Ok(Some(path.to_path_buf()));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file named by {} not found: {}",
                CONFIG_ENV_VAR,
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("signprep").join("config.toml")) {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input_root: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub worker_count: Option<usize>,
    pub retries: Option<u32>,
    pub failure_report: Option<PathBuf>,
}

/// Resolved run configuration handed to every pipeline component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub worker_count: usize,
    pub retry_policy: RetryPolicy,
    pub failure_report: PathBuf,
}

impl PipelineConfig {
    /// Build a validated config with no retries and a default report path
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>, worker_count: usize) -> Result<Self> {
        let output_root = output_root.into();
        let config = Self {
            input_root: input_root.into(),
            failure_report: output_root.join(DEFAULT_FAILURE_REPORT),
            output_root,
            worker_count,
            retry_policy: RetryPolicy::no_retry(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Merge TOML values with command-line overrides (CLI wins)
    pub fn resolve(toml: &TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let input_root = overrides
            .input_root
            .or_else(|| toml.input_root.clone())
            .ok_or_else(|| Error::Config("input_root not configured (use --input-root or config file)".to_string()))?;
        let output_root = overrides
            .output_root
            .or_else(|| toml.output_root.clone())
            .ok_or_else(|| Error::Config("output_root not configured (use --output-root or config file)".to_string()))?;
        let worker_count = overrides
            .worker_count
            .or(toml.worker_count)
            .unwrap_or_else(default_worker_count);
        let retry_policy = overrides
            .retries
            .map(RetryPolicy::with_retries)
            .unwrap_or(toml.retry);
        let failure_report = overrides
            .failure_report
            .or_else(|| toml.failure_report.clone())
            .unwrap_or_else(|| output_root.join(DEFAULT_FAILURE_REPORT));

        let config = Self {
            input_root,
            output_root,
            worker_count,
            retry_policy,
            failure_report,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no run could execute with
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::InvalidInput("worker_count must be at least 1".to_string()));
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(Error::InvalidInput("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.retry, RetryPolicy::no_retry());
        assert_eq!(config.video.extensions, vec!["mp4".to_string()]);
        assert_eq!(config.convert.fps, 25);
        assert_eq!(config.convert.program, PathBuf::from("ffmpeg"));
        assert_eq!(config.convert.source_extensions.len(), 5);
    }

    #[test]
    fn test_parse_partial_file() {
        let config: TomlConfig = toml::from_str(
            r#"
            input_root = "/data/raw"
            worker_count = 12

            [retry]
            max_attempts = 3

            [video.detector]
            program = "python3"
            args = ["detect.py"]
            "#,
        )
        .unwrap();

        assert_eq!(config.input_root, Some(PathBuf::from("/data/raw")));
        assert_eq!(config.output_root, None);
        assert_eq!(config.worker_count, Some(12));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.video.extensions, vec!["mp4".to_string()]);
        assert_eq!(config.video.detector.program, Some(PathBuf::from("python3")));
        assert_eq!(config.video.detector.args, vec!["detect.py".to_string()]);
    }

    #[test]
    fn test_cli_overrides_win() {
        let toml = TomlConfig {
            input_root: Some(PathBuf::from("/toml/in")),
            output_root: Some(PathBuf::from("/toml/out")),
            worker_count: Some(4),
            ..Default::default()
        };
        let config = PipelineConfig::resolve(
            &toml,
            ConfigOverrides {
                output_root: Some(PathBuf::from("/cli/out")),
                worker_count: Some(16),
                retries: Some(2),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(config.input_root, PathBuf::from("/toml/in"));
        assert_eq!(config.output_root, PathBuf::from("/cli/out"));
        assert_eq!(config.worker_count, 16);
        assert_eq!(config.retry_policy.max_attempts, 3);
        assert_eq!(config.failure_report, PathBuf::from("/cli/out/failed.txt"));
    }

    #[test]
    fn test_missing_roots_rejected() {
        let result = PipelineConfig::resolve(&TomlConfig::default(), ConfigOverrides::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = PipelineConfig::new("/in", "/out", 0);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    #[serial]
    fn test_cli_path_must_exist() {
        let result = resolve_config_path(Some(Path::new("/nonexistent/signprep.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_env_path_used_when_no_cli() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "output_root = \"/env/out\"\n").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, &path);
        let loaded = TomlConfig::load(None);
        std::env::remove_var(CONFIG_ENV_VAR);

        let (config, source) = loaded.unwrap();
        assert_eq!(config.output_root, Some(PathBuf::from("/env/out")));
        assert_eq!(source, Some(path));
    }
}
