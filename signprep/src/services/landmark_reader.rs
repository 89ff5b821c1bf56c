//! Landmark table ingestion
//!
//! Reads per-sample landmark tables (Parquet or CSV) through Arrow and
//! validates every row into a strictly typed `LandmarkRow`. Integer and
//! float columns of any width are accepted; null coordinates become NaN.
//! Unknown landmark types, out-of-range indices and missing columns are
//! schema violations raised here, before any alignment happens.

use crate::error::{PipelineError, Result};
use crate::models::LandmarkRow;
use crate::schema::LandmarkType;
use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::compute::cast;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Read and validate all landmark rows of one sample
pub fn read_landmark_rows(path: &Path) -> Result<Vec<LandmarkRow>> {
    if !path.is_file() {
        return Err(PipelineError::SourceMissing(path.display().to_string()));
    }

    let batches = match table_format(path) {
        Some(TableFormat::Parquet) => read_parquet_batches(path)?,
        Some(TableFormat::Csv) => read_csv_batches(path, landmark_column_type)?,
        None => {
            return Err(PipelineError::SchemaViolation(format!(
                "unsupported landmark table format: {}",
                path.display()
            )))
        }
    };

    let mut rows = Vec::new();
    for batch in &batches {
        rows.extend(rows_from_batch(batch)?);
    }
    Ok(rows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableFormat {
    Parquet,
    Csv,
}

fn table_format(path: &Path) -> Option<TableFormat> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "parquet" => Some(TableFormat::Parquet),
        "csv" => Some(TableFormat::Csv),
        _ => None,
    }
}

fn read_parquet_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batches)
}

/// Read a headed CSV file, typing each column by name
///
/// Column names come from the header alone; types come from
/// `column_type`, so all-empty columns (e.g. a sample with no coordinates
/// at all) keep their numeric type.
pub(crate) fn read_csv_batches(
    path: &Path,
    column_type: fn(&str) -> DataType,
) -> Result<Vec<RecordBatch>> {
    let format = Format::default().with_header(true);
    let (header, _) = format.infer_schema(File::open(path)?, Some(0))?;

    let fields: Vec<Field> = header
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), column_type(f.name()), true))
        .collect();
    if fields.iter().all(|f| f.name().is_empty()) {
        return Err(PipelineError::SchemaViolation(format!(
            "missing CSV header: {}",
            path.display()
        )));
    }

    let reader = arrow::csv::ReaderBuilder::new(Arc::new(Schema::new(fields)))
        .with_header(true)
        .build(File::open(path)?)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batches)
}

fn landmark_column_type(name: &str) -> DataType {
    match name {
        "frame" | "landmark_index" => DataType::Int64,
        "x" | "y" | "z" => DataType::Float64,
        _ => DataType::Utf8,
    }
}

/// Fetch a column by name and cast it to `data_type`
pub(crate) fn typed_column(batch: &RecordBatch, name: &str, data_type: &DataType) -> Result<ArrayRef> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::SchemaViolation(format!("missing column '{}'", name)))?;
    Ok(cast(column, data_type)?)
}

fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<LandmarkRow>> {
    let frame = typed_column(batch, "frame", &DataType::Int64)?;
    let index = typed_column(batch, "landmark_index", &DataType::Int64)?;
    let kind = typed_column(batch, "type", &DataType::Utf8)?;
    let x = typed_column(batch, "x", &DataType::Float64)?;
    let y = typed_column(batch, "y", &DataType::Float64)?;
    let z = typed_column(batch, "z", &DataType::Float64)?;

    let frame = frame.as_primitive::<Int64Type>();
    let index = index.as_primitive::<Int64Type>();
    let kind = kind.as_string::<i32>();
    let (x, y, z) = (
        x.as_primitive::<Float64Type>(),
        y.as_primitive::<Float64Type>(),
        z.as_primitive::<Float64Type>(),
    );

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        if frame.is_null(i) || index.is_null(i) || kind.is_null(i) {
            return Err(PipelineError::SchemaViolation(format!(
                "row {} is missing frame, type or landmark_index",
                i
            )));
        }
        let landmark_type: LandmarkType = kind.value(i).parse()?;
        rows.push(LandmarkRow::new(
            frame.value(i),
            landmark_type,
            index.value(i),
            coordinate(x, i),
            coordinate(y, i),
            coordinate(z, i),
        )?);
    }
    Ok(rows)
}

fn coordinate(values: &Float64Array, i: usize) -> f32 {
    if values.is_null(i) {
        f32::NAN
    } else {
        values.value(i) as f32
    }
}
