//! Chunk planning: artifact-major ordering and artifact-aligned splitting.

use std::collections::HashSet;
use std::ops::Range;

use arrow::array::{RecordBatch, UInt64Array};
use arrow::compute::{SortColumn, SortOptions, lexsort_to_indices, take_record_batch};

use crate::constants::{COL_DATA_ID, COL_T, COL_TBAR, COL_TBAR_ARGV};
use crate::error::Result;
use crate::frame;

/// Row ranges of consecutive rows sharing a `data_id`.
pub(crate) fn artifact_runs(ids: &[u64]) -> impl Iterator<Item = Range<usize>> + '_ {
    let mut start = 0;
    std::iter::from_fn(move || {
        let first = *ids.get(start)?;
        let len = ids[start..]
            .iter()
            .position(|&id| id != first)
            .unwrap_or(ids.len() - start);
        let run = start..start + len;
        start += len;
        Some(run)
    })
}

/// Reorder `batch` so artifacts are contiguous, ordered by `(T, data_id)`, and
/// each artifact's rows ascend by `Tbar`.
///
/// Uses a single gather through `dstream_Tbar_argv` when the batch is already
/// artifact-contiguous in `T` order; sorts otherwise.
pub(crate) fn order_rows(batch: &RecordBatch) -> Result<RecordBatch> {
    if batch.num_rows() == 0 {
        return Ok(batch.clone());
    }
    let ids = frame::u64_column(batch, COL_DATA_ID)?;
    let ts = frame::u64_column(batch, COL_T)?;

    if let Some(argv) = frame::optional_u64_column(batch, COL_TBAR_ARGV)? {
        if let Some(indices) = argv_gather(ids.values(), ts.values(), argv.values()) {
            return Ok(take_record_batch(batch, &indices)?);
        }
        tracing::debug!("Tbar argv unusable for this batch; sorting instead");
    }

    let tbar = frame::nullable_u64_column(batch, COL_TBAR)?;
    let ascending = SortOptions {
        descending: false,
        nulls_first: true,
    };
    let columns = [
        SortColumn {
            values: std::sync::Arc::new(ts),
            options: Some(ascending),
        },
        SortColumn {
            values: std::sync::Arc::new(ids),
            options: Some(ascending),
        },
        SortColumn {
            values: std::sync::Arc::new(tbar),
            options: Some(ascending),
        },
    ];
    let indices = lexsort_to_indices(&columns, None)?;
    Ok(take_record_batch(batch, &indices)?)
}

/// Gather indices from per-artifact argsort offsets, or `None` when the rows
/// are not artifact-contiguous in nondecreasing `T` or the offsets are not a
/// permutation.
fn argv_gather(ids: &[u64], ts: &[u64], argv: &[u64]) -> Option<UInt64Array> {
    let mut seen = HashSet::new();
    let mut previous = (0u64, 0u64);
    let mut indices = Vec::with_capacity(ids.len());
    let mut hit = Vec::new();
    for run in artifact_runs(ids) {
        let key = (ts[run.start], ids[run.start]);
        if !seen.insert(key.1) || key < previous {
            return None;
        }
        previous = key;

        let len = run.len();
        hit.clear();
        hit.resize(len, false);
        for row in run.clone() {
            let offset = usize::try_from(argv[row]).ok()?;
            if offset >= len || std::mem::replace(&mut hit[offset], true) {
                return None;
            }
            indices.push((run.start + offset) as u64);
        }
    }
    Some(UInt64Array::from(indices))
}

/// Split an ordered batch into zero-copy slices of at most `chunk_size` rows,
/// never cutting through an artifact. An artifact larger than `chunk_size`
/// gets a chunk of its own.
pub(crate) fn split_at_artifacts(batch: &RecordBatch, chunk_size: usize) -> Result<Vec<RecordBatch>> {
    if batch.num_rows() == 0 {
        return Ok(Vec::new());
    }
    let ids = frame::u64_column(batch, COL_DATA_ID)?;
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for run in artifact_runs(ids.values()) {
        if end > start && run.end - start > chunk_size {
            chunks.push(batch.slice(start, end - start));
            start = end;
        }
        end = run.end;
    }
    chunks.push(batch.slice(start, end - start));
    Ok(chunks)
}
