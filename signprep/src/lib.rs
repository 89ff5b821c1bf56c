//! signprep library interface
//!
//! Turns raw sign-language recordings into fixed-shape keypoint archives:
//! - tabular landmark tables (Parquet/CSV) to `(frames × 1629)` arrays
//! - videos, through an external landmark detector, to `(frames × 1662)` arrays
//! - raw downloads to normalized per-instance clips
//!
//! Exposes public APIs for the binary and for integration testing.

pub mod error;
pub mod models;
pub mod schema;
pub mod services;
pub mod workflow;

pub use crate::error::{PipelineError, Result};
pub use crate::schema::{LandmarkType, TABULAR_FRAME_LEN, VIDEO_FRAME_LEN};
pub use crate::workflow::{run_conversion, run_tabular, run_verify, run_video, RunSummary};
