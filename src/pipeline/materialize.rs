//! Output dataframe assembly.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, UInt64Array};
use arrow::compute::take;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

use crate::constants::{
    COL_ANCESTOR_ID, COL_DATA_ID, COL_DIFFERENTIA_BITWIDTH, COL_HSTRAT_RANK, COL_ID, COL_S,
    PLACEHOLDER,
};
use crate::error::Result;
use crate::frame;
use crate::trie::RecordStore;
use crate::types::SurfaceMeta;

/// Pass-through rows keyed by the `data_id` they belong to.
#[derive(Debug, Default)]
pub(crate) struct PassthroughRows {
    pub(crate) data_ids: Vec<u64>,
    pub(crate) batches: Vec<RecordBatch>,
}

/// Schema of the reconstructed phylogeny, followed by `passthrough` fields.
#[must_use]
pub fn phylogeny_schema(passthrough: &[Arc<Field>]) -> SchemaRef {
    let mut fields: Vec<Arc<Field>> = [
        COL_ID,
        COL_ANCESTOR_ID,
        COL_HSTRAT_RANK,
        COL_DIFFERENTIA_BITWIDTH,
        COL_S,
        COL_DATA_ID,
    ]
    .into_iter()
    .map(|name| Arc::new(Field::new(name, DataType::UInt64, false)))
    .collect();
    fields.extend(passthrough.iter().cloned());
    Arc::new(Schema::new(fields))
}

/// Materialize `store` as a phylogeny dataframe.
pub(crate) fn materialize(
    store: &RecordStore,
    meta: SurfaceMeta,
    passthrough: &[Arc<Field>],
    rows: &PassthroughRows,
) -> Result<RecordBatch> {
    let size = store.size();
    let ids: Vec<u64> = (0..size as u64).collect();
    let data_ids: Vec<u64> = ids.iter().map(|&id| store.data_id(id)).collect();
    let mut columns: Vec<ArrayRef> = vec![
        frame::u64_array(ids.clone()),
        frame::u64_array(ids.iter().map(|&id| store.ancestor_id(id)).collect()),
        frame::u64_array(ids.iter().map(|&id| store.rank(id)).collect()),
        frame::u64_array(vec![meta.differentia_bitwidth; size]),
        frame::u64_array(vec![meta.dstream_s; size]),
        frame::u64_array(data_ids.clone()),
    ];

    if !passthrough.is_empty() {
        let lookup = if rows.batches.is_empty() {
            RecordBatch::new_empty(Arc::new(Schema::new(passthrough.to_vec())))
        } else {
            arrow::compute::concat_batches(&rows.batches[0].schema(), &rows.batches)?
        };
        let row_of: HashMap<u64, u64> = rows
            .data_ids
            .iter()
            .enumerate()
            .map(|(row, &data_id)| (data_id, row as u64))
            .collect();
        let indices: UInt64Array = data_ids
            .iter()
            .map(|data_id| {
                if *data_id == PLACEHOLDER {
                    None
                } else {
                    row_of.get(data_id).copied()
                }
            })
            .collect();
        for column in lookup.columns() {
            columns.push(take(column, &indices, None)?);
        }
    }

    Ok(RecordBatch::try_new(phylogeny_schema(passthrough), columns)?)
}
