//! End-to-end tests for the tabular and video paths
//!
//! Landmark tables are written as CSV fixtures on the fly; the video path
//! runs against an in-memory detector.

use signprep::models::{DetectedFrame, DetectorOutput, LandmarkGroup};
use signprep::services::{read_archive, LandmarkDetector};
use signprep::workflow::{run_tabular, run_verify, run_video};
use signprep::{PipelineError, TABULAR_FRAME_LEN, VIDEO_FRAME_LEN};
use signprep_common::config::VideoConfig;
use signprep_common::PipelineConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "frame,row_id,type,landmark_index,x,y,z\n";

struct Workspace {
    dir: TempDir,
    config: PipelineConfig,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::new(dir.path().join("in"), dir.path().join("out"), 2).unwrap();
        fs::create_dir_all(&config.input_root).unwrap();
        Self { dir, config }
    }

    fn input(&self, relative: &str, content: &str) {
        let path = self.config.input_root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn manifest(&self, rows: &[(&str, &str)]) -> std::path::PathBuf {
        let mut content = String::from("path,participant_id,sequence_id,sign\n");
        for (path, sign) in rows {
            content.push_str(&format!("{},1,1,{}\n", path, sign));
        }
        let path = self.dir.path().join("train.csv");
        fs::write(&path, content).unwrap();
        path
    }

    fn report(&self) -> String {
        fs::read_to_string(&self.config.failure_report).unwrap()
    }
}

#[test]
fn test_tabular_sample_to_archive() {
    let ws = Workspace::new();
    ws.input(
        "landmarks/100.csv",
        &format!(
            "{}0,0-face-0,face,0,0.1,0.2,0.3\n0,0-pose-0,pose,0,0.4,0.5,0.6\n1,1-right_hand-2,right_hand,2,0.7,,0.9\n",
            HEADER
        ),
    );
    let manifest = ws.manifest(&[("landmarks/100.csv", "hello")]);

    let summary = run_tabular(&ws.config, &manifest).unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);

    let array = read_archive(&ws.config.output_root.join("hello/100.npz")).unwrap();
    assert_eq!(array.dim(), (2, TABULAR_FRAME_LEN));
    assert_eq!(array[[0, 0]], 0.1);
    assert_eq!(array[[0, 2]], 0.3);
    assert_eq!(array[[0, 1530]], 0.4);
    assert_eq!(array[[1, 1473]], 0.7);
    assert_eq!(array[[1, 1474]], 0.0);
    assert_eq!(array[[1, 1475]], 0.9);
    assert!(array.iter().all(|v| !v.is_nan()));
    assert_eq!(ws.report(), "");
}

#[test]
fn test_tabular_out_of_order_frames() {
    let ws = Workspace::new();
    ws.input(
        "s.csv",
        &format!(
            "{}9,a,pose,0,0.9,0.9,0.9\n-1,b,pose,0,0.1,0.1,0.1\n4,c,pose,0,0.4,0.4,0.4\n",
            HEADER
        ),
    );
    let manifest = ws.manifest(&[("s.csv", "order")]);
    run_tabular(&ws.config, &manifest).unwrap();

    let array = read_archive(&ws.config.output_root.join("order/s.npz")).unwrap();
    let firsts: Vec<f32> = (0..3).map(|i| array[[i, 1530]]).collect();
    assert_eq!(firsts, vec![0.1, 0.4, 0.9]);
}

#[test]
fn test_tabular_failures_reported_and_run_continues() {
    let ws = Workspace::new();
    ws.input("good.csv", &format!("{}0,a,face,0,0.1,0.1,0.1\n", HEADER));
    ws.input("bad.csv", &format!("{}0,a,torso,0,0.1,0.1,0.1\n", HEADER));
    ws.input("empty.csv", HEADER);
    let manifest = ws.manifest(&[
        ("good.csv", "a"),
        ("bad.csv", "a"),
        ("empty.csv", "a"),
        ("missing.csv", "a"),
    ]);

    let summary = run_tabular(&ws.config, &manifest).unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 3);
    assert!(ws.config.output_root.join("a/good.npz").exists());
    assert!(!ws.config.output_root.join("a/bad.npz").exists());
    assert!(!ws.config.output_root.join("a/empty.npz").exists());

    let input = ws.config.input_root.display().to_string();
    assert_eq!(
        ws.report(),
        format!(
            "bad.csv {0}/bad.csv\nempty.csv {0}/empty.csv\nmissing.csv {0}/missing.csv\n",
            input
        )
    );
}

#[test]
fn test_rerun_skips_finished_work() {
    let ws = Workspace::new();
    ws.input("1.csv", &format!("{}0,a,face,0,0.1,0.1,0.1\n", HEADER));
    ws.input("2.csv", &format!("{}0,a,face,0,0.1,0.1,0.1\n", HEADER));
    let manifest = ws.manifest(&[("1.csv", "cat"), ("2.csv", "cat")]);

    // Pre-existing output is never touched
    fs::create_dir_all(ws.config.output_root.join("cat")).unwrap();
    fs::write(ws.config.output_root.join("cat/1.npz"), b"keep").unwrap();

    let first = run_tabular(&ws.config, &manifest).unwrap();
    assert_eq!(first.planned, 1);
    assert_eq!(first.skipped_existing, 1);
    assert_eq!(fs::read(ws.config.output_root.join("cat/1.npz")).unwrap(), b"keep");

    let second = run_tabular(&ws.config, &manifest).unwrap();
    assert_eq!(second.planned, 0);
    assert_eq!(second.skipped_existing, 2);
}

/// Detector returning canned frames keyed by video file stem
struct FakeDetector;

fn full_frame(frame: i64, value: f32) -> DetectedFrame {
    DetectedFrame {
        frame,
        output: DetectorOutput {
            pose: Some(LandmarkGroup::new(vec![vec![value, value, value, 1.0]; 33])),
            face: None,
            left_hand: Some(LandmarkGroup::new(vec![vec![value, f32::NAN, value]; 21])),
            right_hand: None,
        },
    }
}

impl LandmarkDetector for FakeDetector {
    fn detect(&self, video: &Path) -> signprep::Result<Vec<DetectedFrame>> {
        let stem = video.file_stem().unwrap().to_string_lossy().into_owned();
        match stem.as_str() {
            "good" => Ok((0..5).rev().map(|i| full_frame(i, i as f32)).collect()),
            "malformed" => {
                let mut frames: Vec<DetectedFrame> = (0..1000).map(|i| full_frame(i, 0.5)).collect();
                frames[500].output.right_hand = Some(LandmarkGroup::new(vec![vec![0.5; 3]; 20]));
                Ok(frames)
            }
            "crash" => Err(PipelineError::Detector("decoder exited with status 1".to_string())),
            other => panic!("unexpected video {}", other),
        }
    }
}

#[test]
fn test_video_path() {
    let ws = Workspace::new();
    ws.input("hello/good.mp4", "");
    ws.input("hello/malformed.mp4", "");
    ws.input("bye/crash.mp4", "");
    ws.input("bye/notes.txt", "");

    let summary = run_video(&ws.config, &VideoConfig::default(), &FakeDetector).unwrap();
    assert_eq!(summary.planned, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);

    let array = read_archive(&ws.config.output_root.join("hello/good.npz")).unwrap();
    assert_eq!(array.dim(), (5, VIDEO_FRAME_LEN));
    // pose x of first point, frames sorted ascending
    assert_eq!(array[[0, 0]], 0.0);
    assert_eq!(array[[4, 0]], 4.0);
    // left hand y was NaN, right hand absent
    assert_eq!(array[[4, 1537]], 0.0);
    assert!(array.row(4).slice(ndarray::s![1599..]).iter().all(|v| *v == 0.0));

    // One bad frame abandons the whole sequence
    assert!(!ws.config.output_root.join("hello/malformed.npz").exists());
    let report = ws.report();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("bye/crash.mp4 "));
    assert!(lines[1].starts_with("hello/malformed.mp4 "));
}

#[test]
fn test_verify_after_run() {
    let ws = Workspace::new();
    ws.input("hello/good.mp4", "");
    run_video(&ws.config, &VideoConfig::default(), &FakeDetector).unwrap();
    fs::write(ws.config.output_root.join("hello/broken.npz"), b"partial").unwrap();

    let report = run_verify(&ws.config, None).unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.corrupt.len(), 1);

    let listed = fs::read_to_string(ws.config.output_root.join("corrupt.txt")).unwrap();
    assert!(listed.starts_with("hello/broken.npz "));
    assert!(ws.config.output_root.join("hello/broken.npz").exists());
}
