//! Landmark schema registry
//!
//! Fixed landmark-type layout shared by every sample in the dataset:
//! per-type point counts and the offsets of each type inside the flat
//! per-frame vector. The offset map is built once per process.

use crate::error::PipelineError;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::OnceLock;

/// x, y, z
pub const COORDS_PER_POINT: usize = 3;

/// Points per frame across all landmark types
pub const TOTAL_POINTS: usize = 543;

/// Aligned frame length on the tabular path (543 points × xyz)
pub const TABULAR_FRAME_LEN: usize = TOTAL_POINTS * COORDS_PER_POINT;

/// Aligned frame length on the video path (pose carries a visibility component)
pub const VIDEO_FRAME_LEN: usize = 1662;

/// Landmark group produced by the holistic detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LandmarkType {
    Face,
    LeftHand,
    RightHand,
    Pose,
}

impl LandmarkType {
    /// Layout order of the tabular flat vector
    pub const ALL: [LandmarkType; 4] = [
        LandmarkType::Face,
        LandmarkType::LeftHand,
        LandmarkType::RightHand,
        LandmarkType::Pose,
    ];

    /// Concatenation order of the video flat vector
    pub const VIDEO_ORDER: [LandmarkType; 4] = [
        LandmarkType::Pose,
        LandmarkType::Face,
        LandmarkType::LeftHand,
        LandmarkType::RightHand,
    ];

    pub const fn point_count(self) -> usize {
        match self {
            LandmarkType::Face => 468,
            LandmarkType::LeftHand => 21,
            LandmarkType::RightHand => 21,
            LandmarkType::Pose => 33,
        }
    }

    /// Values per point on the video path
    pub const fn video_components(self) -> usize {
        match self {
            LandmarkType::Pose => 4,
            _ => COORDS_PER_POINT,
        }
    }

    /// Length of this group's flattened block on the video path
    pub const fn video_len(self) -> usize {
        self.point_count() * self.video_components()
    }

    pub const fn name(self) -> &'static str {
        match self {
            LandmarkType::Face => "face",
            LandmarkType::LeftHand => "left_hand",
            LandmarkType::RightHand => "right_hand",
            LandmarkType::Pose => "pose",
        }
    }

    const fn layout_index(self) -> usize {
        match self {
            LandmarkType::Face => 0,
            LandmarkType::LeftHand => 1,
            LandmarkType::RightHand => 2,
            LandmarkType::Pose => 3,
        }
    }
}

const _: () = assert!(
    LandmarkType::Face.point_count()
        + LandmarkType::LeftHand.point_count()
        + LandmarkType::RightHand.point_count()
        + LandmarkType::Pose.point_count()
        == TOTAL_POINTS
);

const _: () = assert!(
    LandmarkType::Pose.video_len()
        + LandmarkType::Face.video_len()
        + LandmarkType::LeftHand.video_len()
        + LandmarkType::RightHand.video_len()
        == VIDEO_FRAME_LEN
);

impl fmt::Display for LandmarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LandmarkType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LandmarkType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| PipelineError::SchemaViolation(format!("unknown landmark type '{}'", s)))
    }
}

/// Starting point index of each landmark type in the tabular flat vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOffsetMap {
    offsets: [usize; 4],
}

impl SchemaOffsetMap {
    fn build() -> Self {
        let mut offsets = [0usize; 4];
        let mut offset = 0;
        for t in LandmarkType::ALL {
            offsets[t.layout_index()] = offset;
            offset += t.point_count();
        }
        Self { offsets }
    }

    /// First point index of `t`
    pub fn point_offset(&self, t: LandmarkType) -> usize {
        self.offsets[t.layout_index()]
    }

    /// Point indices owned by `t`
    pub fn point_range(&self, t: LandmarkType) -> Range<usize> {
        let start = self.point_offset(t);
        start..start + t.point_count()
    }

    /// Flat value positions owned by `t` (three per point)
    pub fn value_range(&self, t: LandmarkType) -> Range<usize> {
        let points = self.point_range(t);
        points.start * COORDS_PER_POINT..points.end * COORDS_PER_POINT
    }

    /// Flat position of the x value for landmark `index` of type `t`
    ///
    /// `None` when `index` is outside the type's point count.
    pub fn slot(&self, t: LandmarkType, index: usize) -> Option<usize> {
        if index >= t.point_count() {
            return None;
        }
        Some((self.point_offset(t) + index) * COORDS_PER_POINT)
    }
}

/// Process-wide offset map, built on first use
pub fn offset_map() -> &'static SchemaOffsetMap {
    static OFFSETS: OnceLock<SchemaOffsetMap> = OnceLock::new();
    OFFSETS.get_or_init(SchemaOffsetMap::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_follow_layout_order() {
        let map = offset_map();
        assert_eq!(map.point_offset(LandmarkType::Face), 0);
        assert_eq!(map.point_offset(LandmarkType::LeftHand), 468);
        assert_eq!(map.point_offset(LandmarkType::RightHand), 489);
        assert_eq!(map.point_offset(LandmarkType::Pose), 510);
    }

    #[test]
    fn test_value_ranges_partition_frame() {
        let map = offset_map();
        let mut covered = vec![0u8; TABULAR_FRAME_LEN];
        for t in LandmarkType::ALL {
            let range = map.value_range(t);
            assert_eq!(range.len(), COORDS_PER_POINT * t.point_count());
            for pos in range {
                covered[pos] += 1;
            }
        }
        assert!(covered.iter().all(|&c| c == 1), "ranges must cover each slot exactly once");
    }

    #[test]
    fn test_slot_bounds() {
        let map = offset_map();
        assert_eq!(map.slot(LandmarkType::Pose, 0), Some(510 * 3));
        assert_eq!(map.slot(LandmarkType::Pose, 32), Some(542 * 3));
        assert_eq!(map.slot(LandmarkType::Pose, 33), None);
        assert_eq!(map.slot(LandmarkType::LeftHand, 21), None);
    }

    #[test]
    fn test_offset_map_is_shared() {
        assert!(std::ptr::eq(offset_map(), offset_map()));
    }

    #[test]
    fn test_parse_type_names() {
        for t in LandmarkType::ALL {
            assert_eq!(t.name().parse::<LandmarkType>().unwrap(), t);
        }
        assert!(matches!(
            "torso".parse::<LandmarkType>(),
            Err(PipelineError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_video_lengths() {
        assert_eq!(LandmarkType::Pose.video_len(), 132);
        assert_eq!(LandmarkType::Face.video_len(), 1404);
        assert_eq!(LandmarkType::LeftHand.video_len(), 63);
    }
}
