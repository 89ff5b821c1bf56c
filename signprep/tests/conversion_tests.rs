//! Conversion path tests
//!
//! These avoid a real media tool: availability is checked against a
//! program that always succeeds, and the raw sources are left missing.

use signprep::services::MediaConverter;
use signprep::workflow::run_conversion;
use signprep::PipelineError;
use signprep_common::config::ConvertConfig;
use signprep_common::PipelineConfig;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const INDEX: &str = r#"[
  {"gloss": "book", "instances": [
    {"video_id": "69241", "url": "https://www.youtube.com/watch?v=0UsjUE-TXns", "frame_start": 1, "frame_end": -1},
    {"video_id": "65225", "url": "http://aslbricks.example/65225.mp4", "frame_start": 1, "frame_end": -1}
  ]},
  {"gloss": "drink", "instances": [
    {"video_id": "69241", "url": "http://mirror.example/69241.mp4", "frame_start": 1, "frame_end": -1},
    {"video_id": "05632", "url": "http://signbank.example/05632.mp4", "frame_start": 10, "frame_end": 40}
  ]}
]"#;

fn setup(program: &str) -> (TempDir, PipelineConfig, MediaConverter, PathBuf) {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::new(dir.path().join("raw"), dir.path().join("videos"), 2).unwrap();
    fs::create_dir_all(&config.input_root).unwrap();
    let converter = MediaConverter::from_config(&ConvertConfig {
        program: PathBuf::from(program),
        ..ConvertConfig::default()
    });
    let index = dir.path().join("WLASL_v0.3.json");
    fs::write(&index, INDEX).unwrap();
    (dir, config, converter, index)
}

#[test]
fn test_unavailable_tool_stops_run() {
    let (_dir, config, converter, index) = setup("/nonexistent/media-tool");
    assert!(matches!(
        run_conversion(&config, &converter, &index),
        Err(PipelineError::ConversionFailure(_))
    ));
    assert!(!config.failure_report.exists());
}

#[cfg(unix)]
#[test]
fn test_missing_sources_reported_by_url() {
    let (_dir, config, converter, index) = setup("true");

    let summary = run_conversion(&config, &converter, &index).unwrap();
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.planned, 3);
    assert_eq!(summary.succeeded, 0);

    let report = fs::read_to_string(&config.failure_report).unwrap();
    assert_eq!(
        report,
        "05632 http://signbank.example/05632.mp4\n\
         65225 http://aslbricks.example/65225.mp4\n\
         69241 https://www.youtube.com/watch?v=0UsjUE-TXns\n"
    );
}

#[cfg(unix)]
#[test]
fn test_existing_clips_skipped() {
    let (_dir, config, converter, index) = setup("true");
    fs::create_dir_all(config.output_root.join("book")).unwrap();
    fs::write(config.output_root.join("book/69241.mp4"), b"").unwrap();

    let summary = run_conversion(&config, &converter, &index).unwrap();
    assert_eq!(summary.skipped_existing, 1);
    assert_eq!(summary.planned, 2);
}
