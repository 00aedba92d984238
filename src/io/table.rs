//! Dataframe files for the command-line front end: CSV and Arrow IPC.

use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;

use crate::constants::{COL_ALGO, COL_DATA_HEX};
use crate::error::{ReconstructError, Result};

const CSV_BATCH_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Ipc,
}

impl TableFormat {
    /// Pick a format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("arrow" | "ipc" | "feather") => Ok(Self::Ipc),
            _ => Err(ReconstructError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

/// Read a whole dataframe file into one batch.
pub fn read_table(path: &Path) -> Result<RecordBatch> {
    let (schema, batches) = match TableFormat::from_path(path)? {
        TableFormat::Csv => read_csv(path)?,
        TableFormat::Ipc => read_ipc(path)?,
    };
    let batch = concat_batches(&schema, &batches)?;
    tracing::debug!(
        table.path = %path.display(),
        table.rows = batch.num_rows(),
        table.columns = batch.num_columns(),
        "read table"
    );
    Ok(batch)
}

fn read_csv(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let mut file = BufReader::new(fs_err::File::open(path)?);
    let format = Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(&mut file, None)?;
    file.seek(SeekFrom::Start(0))?;

    // Hex buffers and algorithm tags stay textual even when they look numeric.
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|field| {
            if field.name() == COL_DATA_HEX || field.name() == COL_ALGO {
                field.as_ref().clone().with_data_type(DataType::Utf8)
            } else {
                field.as_ref().clone()
            }
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = arrow::csv::ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(file)?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok((schema, batches))
}

fn read_ipc(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let file = BufReader::new(fs_err::File::open(path)?);
    let reader = FileReader::try_new(file, None)?;
    let schema = reader.schema();
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok((schema, batches))
}

/// Write `batch` to `path` in the format named by its extension.
pub fn write_table(path: &Path, batch: &RecordBatch) -> Result<()> {
    let format = TableFormat::from_path(path)?;
    let file = BufWriter::new(fs_err::File::create(path)?);
    match format {
        TableFormat::Csv => {
            let mut writer = arrow::csv::WriterBuilder::new()
                .with_header(true)
                .build(file);
            writer.write(batch)?;
            writer.into_inner().flush()?;
        }
        TableFormat::Ipc => {
            let mut writer = FileWriter::try_new(file, batch.schema().as_ref())?;
            writer.write(batch)?;
            writer.finish()?;
            writer.into_inner()?.flush()?;
        }
    }
    tracing::debug!(table.path = %path.display(), table.rows = batch.num_rows(), "wrote table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, ArrayRef, AsArray, StringArray, UInt64Array};
    use tempfile::tempdir;

    #[test]
    fn format_from_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.CSV")).expect("csv"), TableFormat::Csv);
        assert_eq!(
            TableFormat::from_path(Path::new("a.feather")).expect("ipc"),
            TableFormat::Ipc
        );
        assert!(matches!(
            TableFormat::from_path(Path::new("a.parquet")),
            Err(ReconstructError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn csv_keeps_hex_textual() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("packed.csv");
        std::fs::write(&path, "data_hex,dstream_S,label\n0012,4,x\n0a0b,4,y\n").expect("write csv");

        let batch = read_table(&path).expect("read csv");
        assert_eq!(batch.num_rows(), 2);
        let hex = batch.column_by_name("data_hex").expect("data_hex");
        assert_eq!(hex.data_type(), &DataType::Utf8);
        assert_eq!(hex.as_string::<i32>().value(0), "0012");
    }

    #[test]
    fn ipc_and_csv_round_trip() {
        let dir = tempdir().expect("tempdir");
        let batch = RecordBatch::try_from_iter([
            ("id", Arc::new(UInt64Array::from(vec![0, 1])) as ArrayRef),
            ("label", Arc::new(StringArray::from(vec![None, Some("a")])) as ArrayRef),
        ])
        .expect("batch");

        let ipc = dir.path().join("out.arrow");
        write_table(&ipc, &batch).expect("write ipc");
        assert_eq!(read_table(&ipc).expect("read ipc"), batch);

        let csv = dir.path().join("out.csv");
        write_table(&csv, &batch).expect("write csv");
        let text = std::fs::read_to_string(&csv).expect("read csv text");
        assert!(text.starts_with("id,label\n"));
        assert_eq!(read_table(&csv).expect("read csv").num_rows(), 2);
    }
}
