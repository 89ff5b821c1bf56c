//! Sequence assembler
//!
//! Orders a sample's frames by frame key, aligns each one and stacks the
//! results into a single (frames × width) array. Any schema or shape
//! violation abandons the whole sample; nothing partial is returned.

use crate::error::{PipelineError, Result};
use crate::models::{DetectedFrame, FrameKey, FrameObservation, LandmarkRow};
use crate::schema::{TABULAR_FRAME_LEN, VIDEO_FRAME_LEN};
use crate::services::frame_aligner::{align_tabular_frame, align_video_frame};
use ndarray::{Array2, ArrayView1};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Per-sample keypoint tensor, one row per frame in ascending frame order
///
/// Built once and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceArray(Array2<f32>);

impl SequenceArray {
    /// Wrap a flat row-major buffer of `frames × width` values
    fn from_flat(frames: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        let actual = data.len();
        Array2::from_shape_vec((frames, width), data)
            .map(SequenceArray)
            .map_err(|_| PipelineError::ShapeViolation {
                frame: frames as FrameKey,
                expected: frames * width,
                actual,
            })
    }

    pub fn num_frames(&self) -> usize {
        self.0.nrows()
    }

    pub fn frame_len(&self) -> usize {
        self.0.ncols()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f32> {
        self.0.row(index)
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.0
    }
}

/// Group tabular rows by frame key, ascending
pub fn group_rows(rows: Vec<LandmarkRow>) -> Vec<FrameObservation> {
    let mut frames: BTreeMap<FrameKey, Vec<LandmarkRow>> = BTreeMap::new();
    for row in rows {
        frames.entry(row.frame).or_default().push(row);
    }
    frames
        .into_iter()
        .map(|(frame, rows)| FrameObservation { frame, rows })
        .collect()
}

/// Assemble a tabular sample into a (frames × 1629) array
pub fn assemble_tabular(sample: &str, rows: Vec<LandmarkRow>) -> Result<SequenceArray> {
    let observations = group_rows(rows);
    if observations.is_empty() {
        return Err(PipelineError::EmptySequence);
    }

    let mut data = Vec::with_capacity(observations.len() * TABULAR_FRAME_LEN);
    let mut nan_total = 0;
    for observation in &observations {
        let aligned = align_tabular_frame(&observation.rows)?;
        nan_total += aligned.nan_replaced;
        data.extend_from_slice(&aligned.values);
    }

    if nan_total > 0 {
        debug!(sample, nan_values = nan_total, "Zero-filled missing coordinates");
    }

    SequenceArray::from_flat(observations.len(), TABULAR_FRAME_LEN, data)
}

/// Assemble a video sample into a (frames × 1662) array
///
/// One malformed frame invalidates the fixed-shape contract for the whole
/// sequence, regardless of how many frames before it were valid.
pub fn assemble_video(sample: &str, mut frames: Vec<DetectedFrame>) -> Result<SequenceArray> {
    if frames.is_empty() {
        return Err(PipelineError::EmptySequence);
    }
    frames.sort_by_key(|f| f.frame);

    let mut data = Vec::with_capacity(frames.len() * VIDEO_FRAME_LEN);
    for detected in &frames {
        let aligned = align_video_frame(detected.frame, &detected.output)?;
        if aligned.nan_replaced > 0 {
            warn!(
                sample,
                frame = detected.frame,
                nan_values = aligned.nan_replaced,
                "NaN detected, replacing with zero"
            );
        }
        data.extend_from_slice(&aligned.values);
    }

    SequenceArray::from_flat(frames.len(), VIDEO_FRAME_LEN, data)
}
