//! Per-path workflows
//!
//! Each run follows the same shape: plan, execute on the worker pool,
//! merge planning rejections with task failures, write the failure report
//! and log a summary. Only problems that prevent a run from starting are
//! returned as errors.

use crate::error::Result;
use crate::models::{ConversionTask, FailureRecord, SampleTask};
use crate::services::archive::write_archive;
use crate::services::batch_runner::{write_failure_report, BatchReport, BatchRunner};
use crate::services::detector::LandmarkDetector;
use crate::services::file_scanner::FileScanner;
use crate::services::integrity::{self, IntegrityReport};
use crate::services::landmark_reader::read_landmark_rows;
use crate::services::media_converter::MediaConverter;
use crate::services::sequence_assembler::{assemble_tabular, assemble_video};
use crate::services::task_planner::{read_conversion_index, read_manifest, Plan, TaskPlanner};
use signprep_common::config::VideoConfig;
use signprep_common::PipelineConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default integrity report name, placed under the output root
pub const DEFAULT_INTEGRITY_REPORT: &str = "corrupt.txt";

/// Counts for one completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub planned: usize,
    pub skipped_existing: usize,
    pub duplicates: usize,
    pub succeeded: usize,
    /// Planning rejections plus task failures
    pub failed: usize,
    pub report_path: PathBuf,
    pub elapsed: Duration,
}

/// Tabular landmark tables listed in `manifest` to `.npz` archives
pub fn run_tabular(config: &PipelineConfig, manifest: &Path) -> Result<RunSummary> {
    let entries = read_manifest(manifest)?;
    info!(manifest = %manifest.display(), entries = entries.len(), "Manifest loaded");

    let plan = TaskPlanner::new(config).plan_tabular(&entries);
    let report = BatchRunner::new(config).run(&plan.tasks, process_tabular)?;
    finish("tabular", config, plan, report)
}

/// Read, align and persist one tabular sample
pub fn process_tabular(task: &SampleTask) -> Result<()> {
    let rows = read_landmark_rows(&task.source)?;
    let sequence = assemble_tabular(&task.id, rows)?;
    write_archive(&task.destination, &sequence)?;
    info!(
        sample = %task.id,
        frames = sequence.num_frames(),
        destination = %task.destination.display(),
        "Sample written"
    );
    Ok(())
}

/// Videos under the input root to `.npz` archives via `detector`
pub fn run_video(
    config: &PipelineConfig,
    video: &VideoConfig,
    detector: &dyn LandmarkDetector,
) -> Result<RunSummary> {
    let scanner = FileScanner::new(&video.extensions);
    let plan = TaskPlanner::new(config).plan_videos(&scanner)?;
    let report = BatchRunner::new(config).run(&plan.tasks, |task| process_video(task, detector))?;
    finish("video", config, plan, report)
}

/// Detect, align and persist one video sample
pub fn process_video(task: &SampleTask, detector: &dyn LandmarkDetector) -> Result<()> {
    let frames = detector.detect(&task.source)?;
    let sequence = assemble_video(&task.id, frames)?;
    write_archive(&task.destination, &sequence)?;
    info!(
        sample = %task.id,
        frames = sequence.num_frames(),
        destination = %task.destination.display(),
        "Sample written"
    );
    Ok(())
}

/// Conversion index entries to per-instance clips
///
/// The media tool is checked once up front; a missing tool stops the run.
pub fn run_conversion(config: &PipelineConfig, converter: &MediaConverter, index: &Path) -> Result<RunSummary> {
    converter.check_available()?;

    let glosses = read_conversion_index(index)?;
    info!(index = %index.display(), glosses = glosses.len(), "Conversion index loaded");

    let plan = TaskPlanner::new(config).plan_conversions(&glosses);
    let report = BatchRunner::new(config).run(&plan.tasks, |task: &ConversionTask| converter.run_task(task))?;
    finish("conversion", config, plan, report)
}

/// Integrity sweep over the output root
///
/// Writes the corrupt archive list to `report_path`, or to
/// `corrupt.txt` under the output root.
pub fn run_verify(config: &PipelineConfig, report_path: Option<&Path>) -> Result<IntegrityReport> {
    let report = integrity::sweep(&config.output_root, config.worker_count)?;
    let path = report_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output_root.join(DEFAULT_INTEGRITY_REPORT));
    write_failure_report(&path, &report.corrupt)?;
    Ok(report)
}

fn finish<T>(kind: &str, config: &PipelineConfig, plan: Plan<T>, report: BatchReport) -> Result<RunSummary> {
    let mut failures: Vec<FailureRecord> = plan.rejected;
    failures.extend(report.failures);
    let failed = write_failure_report(&config.failure_report, &failures)?;

    let summary = RunSummary {
        planned: report.total,
        skipped_existing: plan.skipped_existing,
        duplicates: plan.duplicates,
        succeeded: report.succeeded,
        failed,
        report_path: config.failure_report.clone(),
        elapsed: report.elapsed,
    };
    info!(
        kind,
        planned = summary.planned,
        skipped_existing = summary.skipped_existing,
        duplicates = summary.duplicates,
        succeeded = summary.succeeded,
        failed = summary.failed,
        report = %summary.report_path.display(),
        "Run complete"
    );
    Ok(summary)
}
