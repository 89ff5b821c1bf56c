//! Error types for signprep
//!
//! Every per-task failure is one of these variants. The batch runner turns
//! them into failure records at the task boundary; none of them stops a run.

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Landmark row references an unknown type, an out-of-range index,
    /// or the table is missing a required column
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Aligned frame vector has the wrong length; the whole sample is abandoned
    #[error("Shape violation at frame {frame}: expected {expected} values, got {actual}")]
    ShapeViolation {
        frame: i64,
        expected: usize,
        actual: usize,
    },

    /// Sample produced no frames at all
    #[error("Sample contains no frames")]
    EmptySequence,

    /// Existing archive cannot be opened or validated
    #[error("Corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    /// External media tool exited unsuccessfully
    #[error("Conversion failed: {0}")]
    ConversionFailure(String),

    /// Raw input for a task could not be located
    #[error("Source missing: {0}")]
    SourceMissing(String),

    /// External landmark detector failed or produced unreadable output
    #[error("Detector failed: {0}")]
    Detector(String),

    /// Worker panicked while running a task
    #[error("Worker panicked: {0}")]
    WorkerPanic(String),

    /// Worker pool could not be started
    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Archive write error: {0}")]
    NpzWrite(#[from] ndarray_npy::WriteNpzError),

    #[error("Archive read error: {0}")]
    NpzRead(#[from] ndarray_npy::ReadNpzError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Common error: {0}")]
    Common(#[from] signprep_common::Error),
}

impl PipelineError {
    /// Only external conversion failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::ConversionFailure(_))
    }

    /// Short stable code used in log events
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::SchemaViolation(_) => "SCHEMA_VIOLATION",
            PipelineError::ShapeViolation { .. } => "SHAPE_VIOLATION",
            PipelineError::EmptySequence => "EMPTY_SEQUENCE",
            PipelineError::CorruptArchive { .. } => "CORRUPT_ARCHIVE",
            PipelineError::ConversionFailure(_) => "CONVERSION_FAILURE",
            PipelineError::SourceMissing(_) => "SOURCE_MISSING",
            PipelineError::Detector(_) => "DETECTOR_ERROR",
            PipelineError::WorkerPanic(_) => "WORKER_PANIC",
            PipelineError::WorkerPool(_) => "WORKER_POOL_ERROR",
            PipelineError::Io(_) => "IO_ERROR",
            PipelineError::Arrow(_) | PipelineError::Parquet(_) => "TABLE_READ_ERROR",
            PipelineError::NpzWrite(_) | PipelineError::NpzRead(_) => "ARCHIVE_ERROR",
            PipelineError::Json(_) => "JSON_ERROR",
            PipelineError::Common(_) => "COMMON_ERROR",
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
