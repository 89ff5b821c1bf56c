//! Archive writer and reader
//!
//! Sequence arrays are stored as compressed `.npz` containers holding a
//! single f32 field named `keypoints`. Writes go to a sibling `.partial`
//! file that is renamed into place once complete, so an interrupted write
//! never leaves a file that resume logic would mistake for finished work.

use crate::error::{PipelineError, Result};
use crate::services::sequence_assembler::SequenceArray;
use ndarray::Array2;
use ndarray_npy::{NpzReader, NpzWriter};
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Field name of the keypoint array inside every archive
pub const KEYPOINTS_FIELD: &str = "keypoints";

/// Persist a sequence array at `destination`
///
/// Missing parent directories are created. Existence is not re-checked;
/// skipping finished work is the planner's job.
pub fn write_archive(destination: &Path, sequence: &SequenceArray) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = partial_path(destination);
    let written = write_npz(&partial, sequence.as_array()).and_then(|()| {
        fs::rename(&partial, destination)?;
        Ok(())
    });
    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written
}

fn write_npz(path: &Path, array: &Array2<f32>) -> Result<()> {
    let mut npz = NpzWriter::new_compressed(File::create(path)?);
    npz.add_array(KEYPOINTS_FIELD, array)?;
    npz.finish()?;
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name: OsString = destination.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Read the `keypoints` array back from an archive
pub fn read_archive(path: &Path) -> Result<Array2<f32>> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let name = npz
        .names()?
        .into_iter()
        .find(|n| n == KEYPOINTS_FIELD || n.strip_suffix(".npy") == Some(KEYPOINTS_FIELD))
        .ok_or_else(|| PipelineError::CorruptArchive {
            path: path.to_path_buf(),
            reason: format!("no '{}' field", KEYPOINTS_FIELD),
        })?;
    Ok(npz.by_name(&name)?)
}
