//! Data models for signprep
//!
//! - Frame observations (tabular rows, detector output)
//! - Sample tasks, failure records and task outcomes

pub mod frame;
pub mod task;

pub use frame::{DetectedFrame, DetectorOutput, FrameKey, FrameObservation, LandmarkGroup, LandmarkRow};
pub use task::{ConversionTask, FailureRecord, FrameSpan, SampleTask, TaskOutcome};
