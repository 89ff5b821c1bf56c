//! Sample tasks, failure records and per-task outcomes

use crate::error::PipelineError;
use std::path::PathBuf;

/// One unit of planned work: one input sample, one output artifact
///
/// Created by the planner and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleTask {
    /// Identifier used for deduplication and failure reporting
    pub id: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Source reference written to the failure report (path or URL)
    pub reference: String,
}

impl SampleTask {
    /// Task whose failure reference is the source path itself
    pub fn new(id: impl Into<String>, source: PathBuf, destination: PathBuf) -> Self {
        let reference = source.display().to_string();
        Self {
            id: id.into(),
            source,
            destination,
            reference,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }
}

impl AsRef<SampleTask> for SampleTask {
    fn as_ref(&self) -> &SampleTask {
        self
    }
}

/// Inclusive frame bounds of a clip within a longer source video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    pub start: u32,
    pub end: u32,
}

impl FrameSpan {
    /// Clip start and duration in seconds at `fps`
    pub fn to_seconds(self, fps: u32) -> (f64, f64) {
        let fps = f64::from(fps.max(1));
        let start = f64::from(self.start) / fps;
        let duration = f64::from(self.end.saturating_sub(self.start) + 1) / fps;
        (start, duration)
    }
}

/// Media conversion task
///
/// `task.source` is the raw file stem; the extension is resolved at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub task: SampleTask,
    pub span: Option<FrameSpan>,
}

impl AsRef<SampleTask> for ConversionTask {
    fn as_ref(&self) -> &SampleTask {
        &self.task
    }
}

/// Non-fatal record of a task that produced no valid output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub id: String,
    pub reference: String,
    /// Human-readable cause, logged but not written to the report
    pub reason: String,
}

impl FailureRecord {
    pub fn from_error(task: &SampleTask, error: &PipelineError) -> Self {
        Self {
            id: task.id.clone(),
            reference: task.reference.clone(),
            reason: error.to_string(),
        }
    }

    /// `<identifier> <source-reference>`
    pub fn report_line(&self) -> String {
        format!("{} {}", self.id, self.reference)
    }
}

/// Result of running one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Artifact written
    Succeeded,
    Failed(FailureRecord),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }
}
