//! Landmark detector seam
//!
//! The video path never decodes video itself. A `LandmarkDetector` turns a
//! video file into per-frame detector output; the shipped implementation
//! runs an external program that prints one JSON object per frame.

use crate::error::{PipelineError, Result};
use crate::models::{DetectedFrame, DetectorOutput, FrameKey, LandmarkGroup};
use serde::Deserialize;
use signprep_common::config::DetectorConfig;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Produces landmark observations for every decoded frame of a video
///
/// Implementations must be shareable across worker threads; each call
/// handles exactly one video.
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, video: &Path) -> Result<Vec<DetectedFrame>>;
}

/// Detector backed by an external program
///
/// The program is invoked as `<program> <args...> <video>` and must write
/// one JSON object per frame to stdout:
///
/// ```text
/// {"frame": 0, "pose": [[x, y, z, v], ...], "face": null, "left_hand": [[x, y, z], ...], "right_hand": null}
/// ```
///
/// Absent or `null` groups mean nothing was detected. `null` coordinates
/// become NaN. Its stderr is passed through to ours.
#[derive(Debug, Clone)]
pub struct ExternalDetector {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalDetector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        let program = config.program.clone().ok_or_else(|| {
            signprep_common::Error::Config(
                "no landmark detector configured (set [video.detector] program or use --detector)".to_string(),
            )
        })?;
        Ok(Self::new(program, config.args.clone()))
    }
}

impl LandmarkDetector for ExternalDetector {
    fn detect(&self, video: &Path) -> Result<Vec<DetectedFrame>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(video)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| PipelineError::Detector(format!("failed to start {}: {}", self.program.display(), e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Detector("detector stdout unavailable".to_string()))?;
        let parsed = parse_detector_output(BufReader::new(stdout));
        if parsed.is_err() {
            let _ = child.kill();
        }

        let status = child.wait()?;
        let frames = parsed?;
        if !status.success() {
            return Err(PipelineError::Detector(format!(
                "{} exited with {} for {}",
                self.program.display(),
                status,
                video.display()
            )));
        }

        tracing::debug!(video = %video.display(), frames = frames.len(), "Detection complete");
        Ok(frames)
    }
}

type RawGroup = Vec<Vec<Option<f32>>>;

#[derive(Debug, Deserialize)]
struct DetectorLine {
    frame: FrameKey,
    #[serde(default)]
    pose: Option<RawGroup>,
    #[serde(default)]
    face: Option<RawGroup>,
    #[serde(default)]
    left_hand: Option<RawGroup>,
    #[serde(default)]
    right_hand: Option<RawGroup>,
}

fn to_group(raw: Option<RawGroup>) -> Option<LandmarkGroup> {
    raw.map(|points| {
        LandmarkGroup::new(
            points
                .into_iter()
                .map(|point| point.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
                .collect(),
        )
    })
}

/// Parse JSON-lines detector output; blank lines are ignored
pub fn parse_detector_output<R: BufRead>(reader: R) -> Result<Vec<DetectedFrame>> {
    let mut frames = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: DetectorLine = serde_json::from_str(&line)
            .map_err(|e| PipelineError::Detector(format!("line {}: {}", line_no + 1, e)))?;
        frames.push(DetectedFrame {
            frame: parsed.frame,
            output: DetectorOutput {
                pose: to_group(parsed.pose),
                face: to_group(parsed.face),
                left_hand: to_group(parsed.left_hand),
                right_hand: to_group(parsed.right_hand),
            },
        });
    }
    Ok(frames)
}
