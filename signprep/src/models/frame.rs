//! Per-frame landmark observations
//!
//! Tabular samples arrive as validated `LandmarkRow`s grouped into
//! `FrameObservation`s. Video samples arrive as one `DetectorOutput` per
//! decoded frame, each landmark group either fully present or absent.

use crate::error::{PipelineError, Result};
use crate::schema::LandmarkType;

/// Explicit integer key used to order frames within a sample
pub type FrameKey = i64;

/// One validated landmark row of a tabular sample
///
/// Coordinates may be NaN (missing detections); they are zero-filled at
/// alignment time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkRow {
    pub frame: FrameKey,
    pub landmark_type: LandmarkType,
    pub landmark_index: usize,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LandmarkRow {
    /// Validate a raw row against the schema
    pub fn new(
        frame: FrameKey,
        landmark_type: LandmarkType,
        landmark_index: i64,
        x: f32,
        y: f32,
        z: f32,
    ) -> Result<Self> {
        if landmark_index < 0 || landmark_index as usize >= landmark_type.point_count() {
            return Err(PipelineError::SchemaViolation(format!(
                "landmark index {} out of range for type '{}' (0..{}) at frame {}",
                landmark_index,
                landmark_type,
                landmark_type.point_count(),
                frame
            )));
        }

        Ok(Self {
            frame,
            landmark_type,
            landmark_index: landmark_index as usize,
            x,
            y,
            z,
        })
    }
}

/// All rows observed for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub frame: FrameKey,
    pub rows: Vec<LandmarkRow>,
}

/// One landmark group reported by the detector, points in landmark order
///
/// Each point carries 3 values (x, y, z), or 4 for pose (x, y, z, visibility).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LandmarkGroup {
    pub points: Vec<Vec<f32>>,
}

impl LandmarkGroup {
    pub fn new(points: Vec<Vec<f32>>) -> Self {
        Self { points }
    }

    /// Total number of scalar values across all points
    pub fn value_count(&self) -> usize {
        self.points.iter().map(Vec::len).sum()
    }
}

/// Detector result for one decoded frame
///
/// A missing group means the detector found nothing for that body part.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectorOutput {
    pub pose: Option<LandmarkGroup>,
    pub face: Option<LandmarkGroup>,
    pub left_hand: Option<LandmarkGroup>,
    pub right_hand: Option<LandmarkGroup>,
}

impl DetectorOutput {
    pub fn group(&self, t: LandmarkType) -> Option<&LandmarkGroup> {
        match t {
            LandmarkType::Pose => self.pose.as_ref(),
            LandmarkType::Face => self.face.as_ref(),
            LandmarkType::LeftHand => self.left_hand.as_ref(),
            LandmarkType::RightHand => self.right_hand.as_ref(),
        }
    }
}

/// Detector output tagged with its frame key
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFrame {
    pub frame: FrameKey,
    pub output: DetectorOutput,
}
