//! Media conversion adapter
//!
//! Wraps the external media tool used to normalize raw downloads into
//! per-instance `.mp4` clips. The tool writes to a temporary sibling file
//! that is renamed into place on success and removed on failure.

use crate::error::{PipelineError, Result};
use crate::models::{ConversionTask, FrameSpan};
use signprep_common::config::ConvertConfig;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// External media tool invocation
#[derive(Debug, Clone)]
pub struct MediaConverter {
    program: PathBuf,
    fps: u32,
    source_extensions: Vec<String>,
}

impl MediaConverter {
    pub fn from_config(config: &ConvertConfig) -> Self {
        Self {
            program: config.program.clone(),
            fps: config.fps,
            source_extensions: config
                .source_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
        }
    }

    /// Fail fast if the tool cannot be executed at all
    pub fn check_available(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                PipelineError::ConversionFailure(format!("{} not available: {}", self.program.display(), e))
            })?;
        if !status.success() {
            return Err(PipelineError::ConversionFailure(format!(
                "{} -version exited with {}",
                self.program.display(),
                status
            )));
        }
        Ok(())
    }

    /// First existing `<stem>.<ext>` in configured probe order
    pub fn find_source(&self, stem: &Path) -> Option<PathBuf> {
        self.source_extensions
            .iter()
            .map(|ext| with_suffix(stem, &format!(".{}", ext)))
            .find(|candidate| candidate.is_file())
    }

    /// Tool arguments for one conversion
    pub fn command_args(&self, source: &Path, destination: &Path, span: Option<FrameSpan>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), source.into()];
        if let Some(span) = span {
            let (start, duration) = span.to_seconds(self.fps);
            args.push("-ss".into());
            args.push(start.to_string().into());
            args.push("-t".into());
            args.push(duration.to_string().into());
        }
        for codec_arg in ["-c:v", "libx264", "-c:a", "aac"] {
            args.push(codec_arg.into());
        }
        args.push(destination.into());
        args
    }

    /// Convert `source` into `destination`, optionally clipped to `span`
    pub fn convert(&self, source: &Path, destination: &Path, span: Option<FrameSpan>) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let partial = partial_path(destination);
        let output = Command::new(&self.program)
            .args(self.command_args(source, &partial, span))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(PipelineError::ConversionFailure(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                )));
            }
        };

        if !output.status.success() {
            let _ = fs::remove_file(&partial);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(PipelineError::ConversionFailure(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                last_line.trim()
            )));
        }

        fs::rename(&partial, destination)?;
        Ok(())
    }

    /// Resolve the raw source for a planned task and convert it
    pub fn run_task(&self, task: &ConversionTask) -> Result<()> {
        let source = self
            .find_source(&task.task.source)
            .ok_or_else(|| PipelineError::SourceMissing(task.task.id.clone()))?;

        tracing::debug!(
            id = %task.task.id,
            source = %source.display(),
            clipped = task.span.is_some(),
            "Converting"
        );
        self.convert(&source, &task.task.destination, task.span)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// `<dir>/<stem>.partial.mp4`, keeping the container extension last so
/// the tool still infers the output format from it
fn partial_path(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = destination
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    destination.with_file_name(format!("{}.partial.{}", stem, ext))
}
