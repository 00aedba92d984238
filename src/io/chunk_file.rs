//! Chunk hand-off files: one prepared chunk per uncompressed Arrow IPC file.

use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use arrow::array::RecordBatch;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use memmap2::Mmap;
use tempfile::TempPath;

use crate::constants::{CHUNK_FILE_PREFIX, CHUNK_FILE_SUFFIX};
use crate::error::Result;

/// Write `batch` to a fresh uniquely named file under `dir` (or the platform
/// temp dir). The file is removed when the returned path is dropped.
pub fn write_chunk(batch: &RecordBatch, dir: Option<&Path>) -> Result<TempPath> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(CHUNK_FILE_PREFIX).suffix(CHUNK_FILE_SUFFIX);
    let named = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    let (file, path) = named.into_parts();

    let mut writer = FileWriter::try_new(BufWriter::new(file), batch.schema().as_ref())?;
    writer.write(batch)?;
    writer.finish()?;
    let mut sink = writer.into_inner()?;
    sink.flush()?;

    tracing::trace!(
        chunk.path = %path.display(),
        chunk.rows = batch.num_rows(),
        "wrote chunk file"
    );
    Ok(path)
}

/// Map a chunk file and decode every batch it holds.
pub fn read_chunk(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = fs_err::File::open(path)?;
    // Safety: read-only mapping of a file only this process writes, and the
    // writer has finished before the path is handed over.
    let mmap = unsafe { Mmap::map(file.file())? };
    let reader = FileReader::try_new(Cursor::new(&mmap[..]), None)?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}
