//! Sample task planner
//!
//! The single source of truth for "work remaining". Enumerates
//! (input, output) pairs, then:
//! - skips entries whose destination already exists (safe to re-run after
//!   a partial run)
//! - drops repeated identifiers in the conversion index, keeping the first
//! - drops entries whose destination an earlier entry already claimed, so
//!   no two workers ever write the same file
//! - rejects entries whose destination would escape the output root
//!
//! Rejected entries become failure records so they show up in the report.

use crate::error::{PipelineError, Result};
use crate::models::{ConversionTask, FailureRecord, FrameSpan, SampleTask};
use crate::services::file_scanner::FileScanner;
use crate::services::landmark_reader::{read_csv_batches, typed_column};
use arrow::array::{Array, AsArray};
use arrow::datatypes::DataType;
use serde::Deserialize;
use signprep_common::PipelineConfig;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Archive extension written by the keypoint paths
pub const ARCHIVE_EXTENSION: &str = "npz";

/// Container extension written by the conversion path
pub const CLIP_EXTENSION: &str = "mp4";

/// One row of the tabular manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Landmark table path, relative to the input root
    pub path: String,
    /// Label, used as the destination subdirectory
    pub sign: String,
}

/// One gloss of the conversion index with its video instances
#[derive(Debug, Clone, Deserialize)]
pub struct GlossEntry {
    pub gloss: String,
    pub instances: Vec<IndexInstance>,
}

/// One video instance of the conversion index
#[derive(Debug, Clone, Deserialize)]
pub struct IndexInstance {
    pub video_id: String,
    #[serde(default)]
    pub url: String,
    /// 1-based first frame of the clip within the source video
    #[serde(default)]
    pub frame_start: i64,
    /// 1-based last frame, or -1 for "until the end"
    #[serde(default)]
    pub frame_end: i64,
}

impl IndexInstance {
    /// Clip bounds, only for YouTube sources with usable frame bounds
    pub fn clip_span(&self) -> Option<FrameSpan> {
        if !(self.url.contains("youtube") || self.url.contains("youtu.be")) {
            return None;
        }
        let start = self.frame_start - 1;
        let end = self.frame_end - 1;
        if end > 0 && start >= 0 && end >= start {
            Some(FrameSpan {
                start: u32::try_from(start).ok()?,
                end: u32::try_from(end).ok()?,
            })
        } else {
            None
        }
    }
}

/// Planned work plus what was left out and why
#[derive(Debug, Clone)]
pub struct Plan<T> {
    pub tasks: Vec<T>,
    /// Entries whose destination already exists
    pub skipped_existing: usize,
    /// Entries dropped as repeated identifiers or destinations
    pub duplicates: usize,
    /// Entries that could not be planned at all
    pub rejected: Vec<FailureRecord>,
}

impl<T> Plan<T> {
    fn new() -> Self {
        Self {
            tasks: Vec::new(),
            skipped_existing: 0,
            duplicates: 0,
            rejected: Vec::new(),
        }
    }
}

/// Read the tabular manifest (`path`, `sign` columns; others ignored)
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let batches = read_csv_batches(path, |_| DataType::Utf8)?;

    let mut entries = Vec::new();
    for batch in &batches {
        let paths = typed_column(batch, "path", &DataType::Utf8)?;
        let signs = typed_column(batch, "sign", &DataType::Utf8)?;
        let (paths, signs) = (paths.as_string::<i32>(), signs.as_string::<i32>());
        for i in 0..batch.num_rows() {
            if paths.is_null(i) || signs.is_null(i) {
                warn!(row = i, "Manifest row missing path or sign, ignoring");
                continue;
            }
            entries.push(ManifestEntry {
                path: paths.value(i).to_string(),
                sign: signs.value(i).to_string(),
            });
        }
    }
    Ok(entries)
}

/// Read the conversion index (JSON array of glosses)
pub fn read_conversion_index(path: &Path) -> Result<Vec<GlossEntry>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Plans sample tasks against the configured roots
pub struct TaskPlanner {
    input_root: PathBuf,
    output_root: PathBuf,
}

impl TaskPlanner {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            input_root: config.input_root.clone(),
            output_root: config.output_root.clone(),
        }
    }

    /// Tabular path: `<output_root>/<sign>/<table stem>.npz`
    pub fn plan_tabular(&self, entries: &[ManifestEntry]) -> Plan<SampleTask> {
        let mut plan = Plan::new();
        let mut claimed = HashSet::new();

        for entry in entries {
            let source_rel = Path::new(&entry.path);
            let stem = source_rel.file_stem().map(|s| s.to_string_lossy().into_owned());
            let stem = match stem {
                Some(stem) if is_contained_relative(source_rel) && is_single_component(&entry.sign) => stem,
                _ => {
                    reject(&mut plan, &entry.path, &entry.path, "manifest entry escapes input or output root");
                    continue;
                }
            };

            let destination = self
                .output_root
                .join(&entry.sign)
                .join(format!("{}.{}", stem, ARCHIVE_EXTENSION));
            if skip_claimed(&mut plan, &mut claimed, &destination) || skip_existing(&mut plan, &destination) {
                continue;
            }

            plan.tasks.push(SampleTask::new(
                entry.path.clone(),
                self.input_root.join(source_rel),
                destination,
            ));
        }

        log_plan("tabular", &plan);
        plan
    }

    /// Video path: mirror each video's relative path under the output root
    pub fn plan_videos(&self, scanner: &FileScanner) -> Result<Plan<SampleTask>> {
        let scanned = scanner
            .scan_with_stats(&self.input_root)
            .map_err(|e| PipelineError::SourceMissing(e.to_string()))?;
        info!(
            videos = scanned.files.len(),
            total_bytes = scanned.total_size,
            by_format = ?scanned.by_format,
            "Input scan complete"
        );
        let mut plan = Plan::new();
        let mut claimed = HashSet::new();

        for video in scanned.files {
            let relative = match video.strip_prefix(&self.input_root) {
                Ok(relative) if is_contained_relative(relative) => relative.to_path_buf(),
                _ => {
                    let id = video.display().to_string();
                    reject(&mut plan, &id, &id, "video outside input root");
                    continue;
                }
            };

            let destination = self.output_root.join(&relative).with_extension(ARCHIVE_EXTENSION);
            if skip_claimed(&mut plan, &mut claimed, &destination) || skip_existing(&mut plan, &destination) {
                continue;
            }

            plan.tasks.push(SampleTask::new(
                relative.display().to_string(),
                video,
                destination,
            ));
        }

        log_plan("video", &plan);
        Ok(plan)
    }

    /// Conversion path: `<output_root>/<gloss>/<video_id>.mp4`
    ///
    /// The source stem is `<input_root>/<video_id>`; its extension is
    /// resolved when the task runs.
    pub fn plan_conversions(&self, index: &[GlossEntry]) -> Plan<ConversionTask> {
        let mut plan = Plan::new();
        let mut seen_ids = HashSet::new();

        for entry in index {
            for instance in &entry.instances {
                if !seen_ids.insert(instance.video_id.as_str()) {
                    debug!(video_id = %instance.video_id, "Duplicate video id dropped");
                    plan.duplicates += 1;
                    continue;
                }

                if !is_single_component(&entry.gloss) || !is_single_component(&instance.video_id) {
                    reject(&mut plan, &instance.video_id, &instance.url, "gloss or video id escapes output root");
                    continue;
                }

                let destination = self
                    .output_root
                    .join(&entry.gloss)
                    .join(format!("{}.{}", instance.video_id, CLIP_EXTENSION));
                if skip_existing(&mut plan, &destination) {
                    continue;
                }

                let task = SampleTask::new(
                    instance.video_id.clone(),
                    self.input_root.join(&instance.video_id),
                    destination,
                )
                .with_reference(instance.url.clone());
                plan.tasks.push(ConversionTask {
                    task,
                    span: instance.clip_span(),
                });
            }
        }

        log_plan("conversion", &plan);
        plan
    }
}

fn skip_claimed<T>(plan: &mut Plan<T>, claimed: &mut HashSet<PathBuf>, destination: &Path) -> bool {
    if claimed.insert(destination.to_path_buf()) {
        false
    } else {
        warn!(destination = %destination.display(), "Destination already planned, dropping repeat");
        plan.duplicates += 1;
        true
    }
}

fn skip_existing<T>(plan: &mut Plan<T>, destination: &Path) -> bool {
    if destination.exists() {
        info!("Skipping {}, already exists", destination.display());
        plan.skipped_existing += 1;
        true
    } else {
        false
    }
}

fn reject<T>(plan: &mut Plan<T>, id: &str, reference: &str, reason: &str) {
    warn!(id, reason, "Entry rejected during planning");
    plan.rejected.push(FailureRecord {
        id: id.to_string(),
        reference: reference.to_string(),
        reason: reason.to_string(),
    });
}

fn log_plan<T>(kind: &str, plan: &Plan<T>) {
    info!(
        kind,
        queued = plan.tasks.len(),
        skipped_existing = plan.skipped_existing,
        duplicates = plan.duplicates,
        rejected = plan.rejected.len(),
        "Planning complete"
    );
}

/// Relative path made only of normal components
fn is_contained_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

/// Exactly one normal path component (no separators, no `..`)
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn planner(dir: &TempDir) -> TaskPlanner {
        let config = PipelineConfig::new(dir.path().join("in"), dir.path().join("out"), 1).unwrap();
        TaskPlanner::new(&config)
    }

    fn instance(video_id: &str, url: &str, start: i64, end: i64) -> IndexInstance {
        IndexInstance {
            video_id: video_id.to_string(),
            url: url.to_string(),
            frame_start: start,
            frame_end: end,
        }
    }

    #[test]
    fn test_path_safety() {
        assert!(is_single_component("hello"));
        assert!(is_single_component("thank you"));
        assert!(!is_single_component(""));
        assert!(!is_single_component(".."));
        assert!(!is_single_component("a/b"));
        assert!(!is_single_component("/abs"));
        assert!(!is_single_component("./x"));

        assert!(is_contained_relative(Path::new("train/1/2.parquet")));
        assert!(!is_contained_relative(Path::new("../x.parquet")));
        assert!(!is_contained_relative(Path::new("/x.parquet")));
        assert!(!is_contained_relative(Path::new("")));
    }

    #[test]
    fn test_tabular_destination_layout() {
        let dir = TempDir::new().unwrap();
        let plan = planner(&dir).plan_tabular(&[ManifestEntry {
            path: "train_landmark_files/26734/1000035562.parquet".to_string(),
            sign: "blow".to_string(),
        }]);

        assert_eq!(plan.tasks.len(), 1);
        let task = &plan.tasks[0];
        assert_eq!(task.source, dir.path().join("in/train_landmark_files/26734/1000035562.parquet"));
        assert_eq!(task.destination, dir.path().join("out/blow/1000035562.npz"));
    }

    #[test]
    fn test_tabular_escape_rejected() {
        let dir = TempDir::new().unwrap();
        let plan = planner(&dir).plan_tabular(&[
            ManifestEntry { path: "a.parquet".to_string(), sign: "../evil".to_string() },
            ManifestEntry { path: "../b.parquet".to_string(), sign: "ok".to_string() },
        ]);
        assert!(plan.tasks.is_empty());
        assert_eq!(plan.rejected.len(), 2);
    }

    #[test]
    fn test_existing_destination_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("out/cat")).unwrap();
        fs::write(dir.path().join("out/cat/1.npz"), b"").unwrap();

        let plan = planner(&dir).plan_tabular(&[
            ManifestEntry { path: "1.parquet".to_string(), sign: "cat".to_string() },
            ManifestEntry { path: "2.parquet".to_string(), sign: "cat".to_string() },
        ]);
        assert_eq!(plan.skipped_existing, 1);
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].id, "2.parquet");
    }

    #[test]
    fn test_tabular_repeated_destination_planned_once() {
        let dir = TempDir::new().unwrap();
        let plan = planner(&dir).plan_tabular(&[
            ManifestEntry { path: "a/100.parquet".to_string(), sign: "cat".to_string() },
            ManifestEntry { path: "b/100.parquet".to_string(), sign: "cat".to_string() },
            ManifestEntry { path: "b/100.parquet".to_string(), sign: "dog".to_string() },
        ]);

        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.duplicates, 1);
        assert_eq!(plan.tasks[0].id, "a/100.parquet");
        assert_eq!(plan.tasks[1].destination, dir.path().join("out/dog/100.npz"));
    }

    #[test]
    fn test_video_repeated_destination_planned_once() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("in/hello")).unwrap();
        fs::write(dir.path().join("in/hello/1.mp4"), b"").unwrap();
        fs::write(dir.path().join("in/hello/1.webm"), b"").unwrap();

        let plan = planner(&dir).plan_videos(&FileScanner::new(["mp4", "webm"])).unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.duplicates, 1);
        assert_eq!(plan.tasks[0].id, "hello/1.mp4");
    }

    #[test]
    fn test_manifest_quoted_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.csv");
        fs::write(
            &path,
            "\"path\",\"note, free text\",\"sign\"\ntrain/1.parquet,\"x, y\",blow\n",
        )
        .unwrap();

        let entries = read_manifest(&path).unwrap();
        assert_eq!(
            entries,
            vec![ManifestEntry { path: "train/1.parquet".to_string(), sign: "blow".to_string() }]
        );
    }

    #[test]
    fn test_conversion_dedup_keeps_first() {
        let dir = TempDir::new().unwrap();
        let index = vec![
            GlossEntry {
                gloss: "book".to_string(),
                instances: vec![instance("001", "http://a/001", 0, -1), instance("002", "http://a/002", 0, -1)],
            },
            GlossEntry {
                gloss: "read".to_string(),
                instances: vec![instance("001", "http://b/001", 0, -1)],
            },
        ];
        let plan = planner(&dir).plan_conversions(&index);

        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.duplicates, 1);
        assert_eq!(plan.tasks[0].task.destination, dir.path().join("out/book/001.mp4"));
        assert_eq!(plan.tasks[0].task.reference, "http://a/001");
        assert_eq!(plan.tasks[0].task.source, dir.path().join("in/001"));
    }

    #[test]
    fn test_clip_span_rules() {
        let yt = instance("x", "https://www.youtube.com/watch?v=abc", 11, 60);
        assert_eq!(yt.clip_span(), Some(FrameSpan { start: 10, end: 59 }));

        let full = instance("x", "https://youtu.be/abc", 1, -1);
        assert_eq!(full.clip_span(), None);

        let other = instance("x", "https://aslsignbank.example/abc.mp4", 11, 60);
        assert_eq!(other.clip_span(), None);
    }

    #[test]
    fn test_parse_index() {
        let index: Vec<GlossEntry> = serde_json::from_str(
            r#"[{"gloss": "book", "instances": [
                {"video_id": "69241", "url": "http://x/69241.mp4", "frame_start": 1, "frame_end": -1, "signer_id": 118}
            ]}]"#,
        )
        .unwrap();
        assert_eq!(index[0].instances[0].video_id, "69241");
        assert_eq!(index[0].instances[0].frame_end, -1);
    }
}
