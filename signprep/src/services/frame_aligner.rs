//! Frame aligner
//!
//! Turns one frame's sparse observations into a dense, fixed-length vector:
//! - Tabular: rows are scattered into a zeroed 543×3 holder at the slot
//!   given by the schema offset map
//! - Video: landmark groups are concatenated in pose, face, left hand,
//!   right hand order, with zero blocks standing in for absent groups
//!
//! NaN coordinates are replaced with 0.0 on both paths.

use crate::error::{PipelineError, Result};
use crate::models::{DetectorOutput, FrameKey, LandmarkRow};
use crate::schema::{offset_map, LandmarkType, TABULAR_FRAME_LEN, VIDEO_FRAME_LEN};

/// Dense frame vector plus the number of NaN values that were zero-filled
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFrame {
    pub values: Vec<f32>,
    pub nan_replaced: usize,
}

/// Align one frame of tabular landmark rows
///
/// Each row owns a disjoint slot, so row order does not affect the result.
pub fn align_tabular_frame(rows: &[LandmarkRow]) -> Result<AlignedFrame> {
    let offsets = offset_map();
    let mut values = vec![0.0f32; TABULAR_FRAME_LEN];

    for row in rows {
        let slot = offsets
            .slot(row.landmark_type, row.landmark_index)
            .ok_or_else(|| {
                PipelineError::SchemaViolation(format!(
                    "landmark index {} out of range for type '{}' at frame {}",
                    row.landmark_index, row.landmark_type, row.frame
                ))
            })?;
        values[slot..slot + 3].copy_from_slice(&[row.x, row.y, row.z]);
    }

    let nan_replaced = zero_nans(&mut values);
    Ok(AlignedFrame {
        values,
        nan_replaced,
    })
}

/// Align one frame of detector output
///
/// A concatenated length other than `VIDEO_FRAME_LEN` is a shape
/// violation; the caller abandons the whole sample.
pub fn align_video_frame(frame: FrameKey, output: &DetectorOutput) -> Result<AlignedFrame> {
    let mut values = Vec::with_capacity(VIDEO_FRAME_LEN);

    for t in LandmarkType::VIDEO_ORDER {
        match output.group(t) {
            Some(group) => {
                for point in &group.points {
                    values.extend_from_slice(point);
                }
            }
            None => values.resize(values.len() + t.video_len(), 0.0),
        }
    }

    if values.len() != VIDEO_FRAME_LEN {
        return Err(PipelineError::ShapeViolation {
            frame,
            expected: VIDEO_FRAME_LEN,
            actual: values.len(),
        });
    }

    let nan_replaced = zero_nans(&mut values);
    Ok(AlignedFrame {
        values,
        nan_replaced,
    })
}

fn zero_nans(values: &mut [f32]) -> usize {
    let mut replaced = 0;
    for v in values.iter_mut().filter(|v| v.is_nan()) {
        *v = 0.0;
        replaced += 1;
    }
    replaced
}
