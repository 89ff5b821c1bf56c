//! Pipeline services
//!
//! - Ingestion: landmark tables, video discovery, detector adapter
//! - Alignment and assembly into fixed-shape sequence arrays
//! - Planning, parallel execution and failure reporting
//! - Archive I/O, media conversion and integrity checks

pub mod archive;
pub mod batch_runner;
pub mod detector;
pub mod file_scanner;
pub mod frame_aligner;
pub mod integrity;
pub mod landmark_reader;
pub mod media_converter;
pub mod sequence_assembler;
pub mod task_planner;

pub use archive::{read_archive, write_archive, KEYPOINTS_FIELD};
pub use batch_runner::{write_failure_report, BatchReport, BatchRunner};
pub use detector::{ExternalDetector, LandmarkDetector};
pub use file_scanner::{FileScanner, ScanError, ScanResult};
pub use frame_aligner::{align_tabular_frame, align_video_frame, AlignedFrame};
pub use integrity::{sweep, verify_archive, IntegrityReport};
pub use landmark_reader::read_landmark_rows;
pub use media_converter::MediaConverter;
pub use sequence_assembler::{assemble_tabular, assemble_video, SequenceArray};
pub use task_planner::{read_conversion_index, read_manifest, GlossEntry, IndexInstance, ManifestEntry, Plan, TaskPlanner};
