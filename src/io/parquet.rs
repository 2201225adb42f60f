//! Parquet tables: reading change-break records and writing per-pixel
//! observation tables.
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::debug;

use crate::error::{Error, Result};

/// One change-detection break of a pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakRecord {
    pub x_coord: f64,
    pub y_coord: f64,
    /// Break date in milliseconds since the Unix epoch (UTC); `None` when missing
    pub t_break: Option<i64>,
}

/// `*.parquet` files directly inside `dir`, sorted by name
pub fn find_parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn column_as_f64(batch: &RecordBatch, name: &str, source: &Path) -> Result<Float64Array> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| Error::MissingColumn {
            column: name.to_string(),
            source_name: source.display().to_string(),
        })?;
    let casted = cast(column, &DataType::Float64)?;
    casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| Error::Processing(format!("column {} is not numeric", name)))
}

fn column_as_millis(batch: &RecordBatch, name: &str, source: &Path) -> Result<Vec<Option<i64>>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| Error::MissingColumn {
            column: name.to_string(),
            source_name: source.display().to_string(),
        })?;
    // timestamps are normalised to milliseconds before reinterpreting as integers
    let column: ArrayRef = match column.data_type() {
        DataType::Timestamp(_, tz) => cast(
            column,
            &DataType::Timestamp(arrow::datatypes::TimeUnit::Millisecond, tz.clone()),
        )?,
        DataType::Float32 | DataType::Float64 => {
            let floats = cast(column, &DataType::Float64)?;
            let floats = floats
                .as_any()
                .downcast_ref::<Float64Array>()
                .cloned()
                .ok_or_else(|| Error::Processing(format!("column {} is not numeric", name)))?;
            let values: Vec<Option<i64>> = floats
                .iter()
                .map(|v| v.filter(|f| f.is_finite()).map(|f| f as i64))
                .collect();
            return Ok(values);
        }
        _ => column.clone(),
    };
    let ints = cast(&column, &DataType::Int64)?;
    let ints = ints
        .as_any()
        .downcast_ref::<Int64Array>()
        .cloned()
        .ok_or_else(|| Error::Processing(format!("column {} is not an integer", name)))?;
    Ok(ints.iter().collect())
}

/// Read the `x_coord`, `y_coord` and `tBreak` columns of a break table.
///
/// Rows without coordinates are dropped; other columns are ignored.
pub fn read_break_records(path: &Path) -> Result<Vec<BreakRecord>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let xs = column_as_f64(&batch, "x_coord", path)?;
        let ys = column_as_f64(&batch, "y_coord", path)?;
        let breaks = column_as_millis(&batch, "tBreak", path)?;
        for (i, t_break) in breaks.into_iter().enumerate() {
            if xs.is_null(i) || ys.is_null(i) {
                continue;
            }
            records.push(BreakRecord {
                x_coord: xs.value(i),
                y_coord: ys.value(i),
                t_break,
            });
        }
    }
    debug!("Read {} break records from {:?}", records.len(), path);
    Ok(records)
}

/// Column of an output table
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    fn into_arrow(self) -> (DataType, ArrayRef) {
        match self {
            Column::Float(v) => (DataType::Float64, Arc::new(Float64Array::from(v))),
            Column::Int(v) => (DataType::Int64, Arc::new(Int64Array::from(v))),
            Column::Text(v) => (DataType::Utf8, Arc::new(StringArray::from(v))),
        }
    }
}

/// Ordered named columns written as a single Parquet row group set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<(String, Column)>,
}

impl Table {
    pub fn push(&mut self, name: impl Into<String>, column: Column) {
        self.columns.push((name.into(), column));
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    fn into_batch(self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays = Vec::with_capacity(self.columns.len());
        for (name, column) in self.columns {
            let (dtype, array) = column.into_arrow();
            fields.push(Field::new(name, dtype, true));
            arrays.push(array);
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

/// Write a table to a Snappy-compressed Parquet file
pub fn write_table(table: Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let batch = table.into_batch()?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
