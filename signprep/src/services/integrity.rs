//! Archive integrity sweep
//!
//! Re-opens every archive under the output root and checks it against the
//! fixed-shape contract. Corrupt files are reported, never deleted.

use crate::error::{PipelineError, Result};
use crate::models::FailureRecord;
use crate::schema::{TABULAR_FRAME_LEN, VIDEO_FRAME_LEN};
use crate::services::archive::read_archive;
use crate::services::file_scanner::FileScanner;
use crate::services::task_planner::ARCHIVE_EXTENSION;
use rayon::prelude::*;
use std::path::Path;

/// Outcome of one sweep
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub checked: usize,
    /// Corrupt archives, sorted by path
    pub corrupt: Vec<FailureRecord>,
}

/// Open one archive and validate its shape and contents
pub fn verify_archive(path: &Path) -> Result<()> {
    let corrupt = |reason: String| PipelineError::CorruptArchive {
        path: path.to_path_buf(),
        reason,
    };

    let array = read_archive(path).map_err(|e| match e {
        PipelineError::CorruptArchive { .. } => e,
        other => corrupt(other.to_string()),
    })?;

    let width = array.ncols();
    if width != TABULAR_FRAME_LEN && width != VIDEO_FRAME_LEN {
        return Err(corrupt(format!(
            "frame width {} is neither {} nor {}",
            width, TABULAR_FRAME_LEN, VIDEO_FRAME_LEN
        )));
    }
    if array.nrows() == 0 {
        return Err(corrupt("no frames".to_string()));
    }
    if let Some(position) = array.iter().position(|v| v.is_nan()) {
        return Err(corrupt(format!("NaN at frame {}", position / width)));
    }
    Ok(())
}

/// Check every archive under `root` with `worker_count` threads
pub fn sweep(root: &Path, worker_count: usize) -> Result<IntegrityReport> {
    let archives = FileScanner::new([ARCHIVE_EXTENSION])
        .scan(root)
        .map_err(|e| PipelineError::SourceMissing(e.to_string()))?;

    tracing::info!(root = %root.display(), archives = archives.len(), "Starting integrity sweep");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count.max(1))
        .thread_name(|i| format!("signprep-verify-{}", i))
        .build()?;

    let mut corrupt: Vec<FailureRecord> = pool.install(|| {
        archives
            .par_iter()
            .filter_map(|path| verify_archive(path).err().map(|e| record(root, path, e)))
            .collect()
    });
    corrupt.sort_by(|a, b| a.id.cmp(&b.id));

    let report = IntegrityReport {
        checked: archives.len(),
        corrupt,
    };
    tracing::info!(
        checked = report.checked,
        corrupt = report.corrupt.len(),
        "Integrity sweep complete"
    );
    Ok(report)
}

fn record(root: &Path, path: &Path, error: PipelineError) -> FailureRecord {
    tracing::warn!(path = %path.display(), error = %error, "Corrupt archive");
    let id = path.strip_prefix(root).unwrap_or(path).display().to_string();
    FailureRecord {
        id,
        reference: path.display().to_string(),
        reason: error.to_string(),
    }
}
