//! Parallel batch runner
//!
//! Distributes planned tasks across a fixed-size rayon pool. Each task is
//! isolated: errors and panics become failure records, and the remaining
//! tasks keep running. Retries apply only to retryable errors and only up
//! to the configured attempt count.
//!
//! Workers are threads in one process, so isolation covers errors and
//! unwinding panics only. A task that aborts the process (stack overflow,
//! allocation failure, `panic = "abort"`) ends the whole run. Finished
//! archives survive and a re-run resumes from them, but no failure record
//! is written for the aborting task. Native decoding lives in the external
//! detector and media tool processes, which fail as ordinary errors.

use crate::error::{PipelineError, Result};
use crate::models::{FailureRecord, SampleTask, TaskOutcome};
use rayon::prelude::*;
use signprep_common::{PipelineConfig, RetryPolicy};
use std::any::Any;
use std::collections::BTreeSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Completed-task interval between progress log lines
const PROGRESS_INTERVAL: usize = 100;

/// Aggregate outcome of one batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failures: Vec<FailureRecord>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Runs independent tasks on a bounded worker pool
pub struct BatchRunner {
    worker_count: usize,
    retry_policy: RetryPolicy,
}

impl BatchRunner {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            worker_count: config.worker_count.max(1),
            retry_policy: config.retry_policy,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Run `work` once per task on the pool
    ///
    /// Output order is unspecified; only the pool itself failing to start
    /// is an error.
    pub fn run<T, F>(&self, tasks: &[T], work: F) -> Result<BatchReport>
    where
        T: AsRef<SampleTask> + Sync,
        F: Fn(&T) -> Result<()> + Sync,
    {
        let total = tasks.len();
        let start = Instant::now();
        let processed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        tracing::info!(total, workers = self.worker_count, "Starting batch");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count)
            .thread_name(|i| format!("signprep-worker-{}", i))
            .build()?;

        let outcomes: Vec<TaskOutcome> = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let outcome = self.run_one(task, &work);

                    if !outcome.is_success() {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                    let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % PROGRESS_INTERVAL == 0 && done < total {
                        log_progress(done, total, failed.load(Ordering::Relaxed), start);
                    }
                    outcome
                })
                .collect()
        });

        let failures: Vec<FailureRecord> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                TaskOutcome::Succeeded => None,
                TaskOutcome::Failed(record) => Some(record),
            })
            .collect();

        let report = BatchReport {
            total,
            succeeded: total - failures.len(),
            failures,
            elapsed: start.elapsed(),
        };

        tracing::info!(
            "Batch completed in {:?} | Total: {} | Success: {} | Failed: {}",
            report.elapsed,
            report.total,
            report.succeeded,
            report.failed()
        );
        Ok(report)
    }

    fn run_one<T, F>(&self, task: &T, work: &F) -> TaskOutcome
    where
        T: AsRef<SampleTask>,
        F: Fn(&T) -> Result<()>,
    {
        let sample = task.as_ref();
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = panic::catch_unwind(AssertUnwindSafe(|| work(task)))
                .unwrap_or_else(|payload| Err(PipelineError::WorkerPanic(panic_message(payload.as_ref()))));

            match result {
                Ok(()) => {
                    tracing::debug!(id = %sample.id, attempt, "Task succeeded");
                    return TaskOutcome::Succeeded;
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        id = %sample.id,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Task failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        id = %sample.id,
                        code = e.code(),
                        error = %e,
                        "Task failed"
                    );
                    return TaskOutcome::Failed(FailureRecord::from_error(sample, &e));
                }
            }
        }
    }
}

fn log_progress(done: usize, total: usize, failed: usize, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 { done as f64 / elapsed } else { 0.0 };
    let eta_secs = if rate > 0.0 {
        ((total - done) as f64 / rate) as u64
    } else {
        0
    };

    tracing::info!(
        "Progress: {}/{} ({:.1}%) | Rate: {:.1} tasks/sec | ETA: {}s | Failed: {}",
        done,
        total,
        (done as f64 / total as f64) * 100.0,
        rate,
        eta_secs,
        failed
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Write the failure report, one `<identifier> <source-reference>` per line
///
/// Lines are sorted and deduplicated. The file is written even when there
/// are no failures, so a clean run is distinguishable from a crashed one.
/// Returns the number of lines written.
pub fn write_failure_report(path: &Path, failures: &[FailureRecord]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let lines: BTreeSet<String> = failures.iter().map(FailureRecord::report_line).collect();
    let mut content = String::new();
    for line in &lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(path, content)?;

    tracing::info!(path = %path.display(), failures = lines.len(), "Failure report written");
    Ok(lines.len())
}
