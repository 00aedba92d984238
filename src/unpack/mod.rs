//! Unpacker boundary: packed hex surfaces in, long `(data_id, T, Tbar, value)` table out.
//!
//! Responsibilities:
//! - Define the [`Unpacker`] contract consumed by the reconstruction pipeline.
//! - Provide [`PackedUnpacker`], which decodes `data_hex` bit fields using a
//!   registered [`RetentionAlgorithm`].
//! - Extract the population-wide [`SurfaceMeta`] scalars.
//!
//! An artifact that retains no alleles is emitted as a single marker row with
//! null `dstream_Tbar` and `dstream_value`, so that it still receives a leaf.

pub mod algo;
mod bits;

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, RecordBatch, UInt32Array, UInt64Array};
use arrow::compute::take;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

pub use algo::{CircularAlgo, RetentionAlgorithm, lookup_algorithm};

use crate::constants::{
    COL_ALGO, COL_DATA_HEX, COL_DATA_ID, COL_EXCLUDE_EXPLODED, COL_EXCLUDE_UNPACKED, COL_S,
    COL_STORAGE_BITOFFSET, COL_STORAGE_BITWIDTH, COL_T, COL_T_BITOFFSET, COL_T_BITWIDTH,
    COL_TBAR, COL_TBAR_ARGV, COL_VALUE,
};
use crate::error::{ReconstructError, Result};
use crate::frame;
use crate::types::SurfaceMeta;

/// Converts a packed population into the long table the pipeline consumes.
pub trait Unpacker {
    fn unpack(&self, packed: &RecordBatch) -> Result<RecordBatch>;
}

/// Decoder for the `data_hex` packed surface layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedUnpacker;

/// Population-wide surface metadata, or `None` for an empty batch.
pub fn surface_meta(batch: &RecordBatch) -> Result<Option<SurfaceMeta>> {
    let dstream_s = frame::scalar_u64(batch, COL_S)?;
    let storage_bitwidth = frame::scalar_u64(batch, COL_STORAGE_BITWIDTH)?;
    match (dstream_s, storage_bitwidth) {
        (Some(s), Some(bitwidth)) => SurfaceMeta::from_storage(s, bitwidth).map(Some),
        _ => Ok(None),
    }
}

/// Schema of the long table, followed by `passthrough` fields.
#[must_use]
pub fn long_schema(passthrough: impl IntoIterator<Item = Arc<Field>>) -> SchemaRef {
    let mut fields = vec![
        Arc::new(Field::new(COL_DATA_ID, DataType::UInt64, false)),
        Arc::new(Field::new(COL_T, DataType::UInt64, false)),
        Arc::new(Field::new(COL_TBAR, DataType::UInt64, true)),
        Arc::new(Field::new(COL_VALUE, DataType::UInt64, true)),
        Arc::new(Field::new(COL_TBAR_ARGV, DataType::UInt64, false)),
    ];
    fields.extend(passthrough);
    Arc::new(Schema::new(fields))
}

struct UnpackedArtifact {
    data_id: u64,
    t: u64,
    source_row: u32,
    /// `(Tbar, value)` in site order.
    sites: Vec<(u64, u64)>,
}

struct PackedColumns {
    data_hex: arrow::array::StringArray,
    algo: arrow::array::StringArray,
    storage_bitoffset: UInt64Array,
    storage_bitwidth: UInt64Array,
    t_bitoffset: UInt64Array,
    t_bitwidth: UInt64Array,
    dstream_s: UInt64Array,
    data_id: Option<UInt64Array>,
    exclude_unpacked: Option<arrow::array::BooleanArray>,
    exclude_exploded: Option<arrow::array::BooleanArray>,
}

impl PackedColumns {
    fn read(packed: &RecordBatch) -> Result<Self> {
        Ok(Self {
            data_hex: frame::string_column(packed, COL_DATA_HEX)?,
            algo: frame::string_column(packed, COL_ALGO)?,
            storage_bitoffset: frame::u64_column(packed, COL_STORAGE_BITOFFSET)?,
            storage_bitwidth: frame::u64_column(packed, COL_STORAGE_BITWIDTH)?,
            t_bitoffset: frame::u64_column(packed, COL_T_BITOFFSET)?,
            t_bitwidth: frame::u64_column(packed, COL_T_BITWIDTH)?,
            dstream_s: frame::u64_column(packed, COL_S)?,
            data_id: frame::optional_u64_column(packed, COL_DATA_ID)?,
            exclude_unpacked: frame::optional_bool_column(packed, COL_EXCLUDE_UNPACKED)?,
            exclude_exploded: frame::optional_bool_column(packed, COL_EXCLUDE_EXPLODED)?,
        })
    }
}

impl PackedUnpacker {
    fn unpack_row(
        columns: &PackedColumns,
        row: usize,
        algorithms: &mut HashMap<String, &'static dyn RetentionAlgorithm>,
    ) -> Result<UnpackedArtifact> {
        let data_id = columns
            .data_id
            .as_ref()
            .map_or(row as u64, |ids| ids.value(row));

        if columns.data_hex.is_null(row) {
            return Err(ReconstructError::InvalidHex {
                row,
                reason: "null".into(),
            });
        }
        let bytes = hex::decode(columns.data_hex.value(row).trim()).map_err(|err| {
            ReconstructError::InvalidHex {
                row,
                reason: err.to_string().into(),
            }
        })?;

        let tag = if columns.algo.is_null(row) {
            ""
        } else {
            columns.algo.value(row)
        };
        let algorithm = match algorithms.get(tag) {
            Some(algorithm) => *algorithm,
            None => {
                let algorithm = lookup_algorithm(tag)?;
                algorithms.insert(tag.to_owned(), algorithm);
                algorithm
            }
        };

        let dstream_s = columns.dstream_s.value(row);
        let storage_bitwidth = columns.storage_bitwidth.value(row);
        let meta = SurfaceMeta::from_storage(dstream_s, storage_bitwidth)?;
        let width = meta.differentia_bitwidth;

        let out_of_range = |field: &'static str| ReconstructError::InvalidHex {
            row,
            reason: Cow::Owned(format!("{field} bit field lies outside the buffer")),
        };
        let t = bits::read_bits(
            &bytes,
            columns.t_bitoffset.value(row),
            columns.t_bitwidth.value(row),
        )
        .ok_or_else(|| out_of_range("T"))?;

        // The storage field must fit the buffer before sites are enumerated.
        let storage_offset = columns.storage_bitoffset.value(row);
        let buffer_bits = (bytes.len() as u64).saturating_mul(8);
        match storage_offset.checked_add(storage_bitwidth) {
            Some(end) if end <= buffer_bits => {}
            _ => return Err(out_of_range("storage")),
        }
        let mut sites = Vec::with_capacity(dstream_s as usize);
        for (site, held) in algorithm
            .lookup_ingest_times(dstream_s, t)
            .into_iter()
            .enumerate()
        {
            let Some(tbar) = held else { continue };
            let value = bits::read_bits(&bytes, storage_offset + site as u64 * width, width)
                .ok_or_else(|| out_of_range("storage"))?;
            sites.push((tbar, value));
        }

        Ok(UnpackedArtifact {
            data_id,
            t,
            source_row: u32::try_from(row).map_err(|_| ReconstructError::InvalidColumn {
                column: Cow::Borrowed(COL_DATA_HEX),
                reason: "too many rows".into(),
            })?,
            sites,
        })
    }
}

impl Unpacker for PackedUnpacker {
    fn unpack(&self, packed: &RecordBatch) -> Result<RecordBatch> {
        let passthrough = frame::passthrough_fields(packed.schema().as_ref());
        let schema = long_schema(passthrough.iter().map(|(_, field)| Arc::clone(field)));
        if packed.num_rows() == 0 {
            return Ok(RecordBatch::new_empty(schema));
        }

        let columns = PackedColumns::read(packed)?;
        let mut algorithms = HashMap::new();
        let mut artifacts = Vec::with_capacity(packed.num_rows());
        for row in 0..packed.num_rows() {
            if frame::flag_set(columns.exclude_unpacked.as_ref(), row) {
                continue;
            }
            let artifact = Self::unpack_row(&columns, row, &mut algorithms)?;
            if frame::flag_set(columns.exclude_exploded.as_ref(), row) {
                continue;
            }
            artifacts.push(artifact);
        }
        artifacts.sort_by_key(|artifact| (artifact.t, artifact.data_id, artifact.source_row));

        let rows: usize = artifacts.iter().map(|a| a.sites.len().max(1)).sum();
        let mut data_id = Vec::with_capacity(rows);
        let mut t = Vec::with_capacity(rows);
        let mut tbar = Vec::with_capacity(rows);
        let mut value = Vec::with_capacity(rows);
        let mut argv = Vec::with_capacity(rows);
        let mut source = Vec::with_capacity(rows);
        for artifact in &artifacts {
            if artifact.sites.is_empty() {
                data_id.push(artifact.data_id);
                t.push(artifact.t);
                tbar.push(None);
                value.push(None);
                argv.push(0);
                source.push(artifact.source_row);
                continue;
            }
            let mut order: Vec<u64> = (0..artifact.sites.len() as u64).collect();
            order.sort_by_key(|&position| artifact.sites[position as usize].0);
            for (&(site_tbar, site_value), position) in artifact.sites.iter().zip(order) {
                data_id.push(artifact.data_id);
                t.push(artifact.t);
                tbar.push(Some(site_tbar));
                value.push(Some(site_value));
                argv.push(position);
                source.push(artifact.source_row);
            }
        }

        tracing::debug!(
            unpack.artifacts = artifacts.len(),
            unpack.rows = rows,
            "unpacked packed surfaces"
        );

        let source = UInt32Array::from(source);
        let mut arrays: Vec<ArrayRef> = vec![
            frame::u64_array(data_id),
            frame::u64_array(t),
            Arc::new(UInt64Array::from(tbar)),
            Arc::new(UInt64Array::from(value)),
            frame::u64_array(argv),
        ];
        for (index, _) in &passthrough {
            arrays.push(take(packed.column(*index), &source, None)?);
        }
        Ok(RecordBatch::try_new(schema, arrays)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BooleanArray, StringArray, UInt8Array};

    /// Packs `T` into the first byte and `values` as 4-bit differentia after it.
    fn hex_surface(t: u8, values: &[u8]) -> String {
        let mut bytes = vec![t];
        for pair in values.chunks(2) {
            let high = pair[0] & 0x0f;
            let low = pair.get(1).copied().unwrap_or(0) & 0x0f;
            bytes.push((high << 4) | low);
        }
        hex::encode(bytes)
    }

    fn packed(rows: &[(u8, &[u8])], extra: Vec<(&str, ArrayRef)>) -> RecordBatch {
        let n = rows.len();
        let hexes: Vec<String> = rows.iter().map(|(t, values)| hex_surface(*t, values)).collect();
        let mut columns: Vec<(&str, ArrayRef)> = vec![
            ("data_hex", Arc::new(StringArray::from(hexes)) as ArrayRef),
            (
                "dstream_algo",
                Arc::new(StringArray::from(vec!["dstream.circular_algo"; n])) as ArrayRef,
            ),
            ("dstream_storage_bitoffset", Arc::new(UInt8Array::from(vec![8; n])) as ArrayRef),
            ("dstream_storage_bitwidth", Arc::new(UInt8Array::from(vec![16; n])) as ArrayRef),
            ("dstream_T_bitoffset", Arc::new(UInt8Array::from(vec![0; n])) as ArrayRef),
            ("dstream_T_bitwidth", Arc::new(UInt8Array::from(vec![8; n])) as ArrayRef),
            ("dstream_S", Arc::new(UInt8Array::from(vec![4; n])) as ArrayRef),
        ];
        columns.extend(extra);
        RecordBatch::try_from_iter(columns).expect("packed batch")
    }

    fn u64s(batch: &RecordBatch, name: &'static str) -> Vec<Option<u64>> {
        frame::nullable_u64_column(batch, name)
            .expect("column")
            .iter()
            .collect()
    }

    #[test]
    fn unpacks_circular_surfaces_in_t_order() {
        let batch = packed(&[(6, &[4, 5, 2, 3]), (2, &[9, 8, 0, 0])], vec![]);
        let long = PackedUnpacker.unpack(&batch).expect("unpack");

        // T=2 artifact (row 1) first, then T=6 (row 0).
        assert_eq!(
            u64s(&long, COL_DATA_ID),
            vec![Some(1), Some(1), Some(0), Some(0), Some(0), Some(0)]
        );
        assert_eq!(
            u64s(&long, COL_TBAR),
            vec![Some(0), Some(1), Some(4), Some(5), Some(2), Some(3)]
        );
        assert_eq!(
            u64s(&long, COL_VALUE),
            vec![Some(9), Some(8), Some(4), Some(5), Some(2), Some(3)]
        );
        // Row offsets of ranks 2, 3, 4, 5 within the T=6 artifact.
        assert_eq!(
            u64s(&long, COL_TBAR_ARGV),
            vec![Some(0), Some(1), Some(2), Some(3), Some(0), Some(1)]
        );
    }

    #[test]
    fn empty_surface_emits_marker_row() {
        let batch = packed(&[(0, &[0, 0, 0, 0])], vec![]);
        let long = PackedUnpacker.unpack(&batch).expect("unpack");
        assert_eq!(long.num_rows(), 1);
        assert_eq!(u64s(&long, COL_T), vec![Some(0)]);
        assert_eq!(u64s(&long, COL_TBAR), vec![None]);
    }

    #[test]
    fn filters_and_passthrough() {
        let batch = packed(
            &[(1, &[1, 0, 0, 0]), (1, &[2, 0, 0, 0]), (1, &[3, 0, 0, 0])],
            vec![
                (
                    "dstream_data_id",
                    Arc::new(UInt64Array::from(vec![10, 20, 30])) as ArrayRef,
                ),
                (
                    "downstream_exclude_unpacked",
                    Arc::new(BooleanArray::from(vec![true, false, false])) as ArrayRef,
                ),
                (
                    "downstream_exclude_exploded",
                    Arc::new(BooleanArray::from(vec![Some(false), Some(true), None])) as ArrayRef,
                ),
                ("label", Arc::new(StringArray::from(vec!["a", "b", "c"])) as ArrayRef),
            ],
        );
        let long = PackedUnpacker.unpack(&batch).expect("unpack");
        assert_eq!(u64s(&long, COL_DATA_ID), vec![Some(30)]);
        assert_eq!(u64s(&long, COL_VALUE), vec![Some(3)]);
        assert!(long.column_by_name("downstream_exclude_unpacked").is_none());
        let label = long.column_by_name("label").expect("label column");
        let label = label
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("utf8 label");
        assert_eq!(label.value(0), "c");
    }

    #[test]
    fn rejects_bad_hex_and_unknown_algorithm() {
        let mut batch = packed(&[(1, &[1, 0, 0, 0])], vec![]);
        let hex = Arc::new(StringArray::from(vec!["zz"])) as ArrayRef;
        let mut columns = batch.columns().to_vec();
        columns[0] = hex;
        batch = RecordBatch::try_new(batch.schema(), columns).expect("swap hex");
        assert!(matches!(
            PackedUnpacker.unpack(&batch),
            Err(ReconstructError::InvalidHex { row: 0, .. })
        ));

        let batch = packed(&[(1, &[1, 0, 0, 0])], vec![]);
        let mut columns = batch.columns().to_vec();
        columns[1] = Arc::new(StringArray::from(vec!["dstream.steady_algo"]));
        let batch = RecordBatch::try_new(batch.schema(), columns).expect("swap algo");
        assert!(matches!(
            PackedUnpacker.unpack(&batch),
            Err(ReconstructError::UnsupportedAlgorithm { .. })
        ));
    }

    /// Swap column `index` of `batch`, letting its type change.
    fn replace(batch: &RecordBatch, index: usize, column: ArrayRef) -> RecordBatch {
        let schema = batch.schema();
        let mut columns: Vec<(&str, ArrayRef)> = schema
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| (field.name().as_str(), Arc::clone(array)))
            .collect();
        columns[index].1 = column;
        RecordBatch::try_from_iter(columns).expect("replaced column")
    }

    #[test]
    fn storage_field_must_fit_the_buffer() {
        // 16 storage bits in the buffer, 32 claimed.
        let batch = packed(&[(3, &[1, 2, 3, 4])], vec![]);
        let batch = replace(&batch, 3, Arc::new(UInt8Array::from(vec![32])));
        let err = PackedUnpacker.unpack(&batch).expect_err("oversized storage");
        assert!(
            matches!(&err, ReconstructError::InvalidHex { row: 0, reason } if reason.contains("storage")),
            "{err}"
        );

        // An offset that would overflow is reported, not wrapped.
        let batch = packed(&[(3, &[1, 2, 3, 4])], vec![]);
        let batch = replace(&batch, 2, Arc::new(UInt64Array::from(vec![u64::MAX - 4])));
        assert!(matches!(
            PackedUnpacker.unpack(&batch),
            Err(ReconstructError::InvalidHex { row: 0, .. })
        ));
    }

    #[test]
    fn surface_meta_requires_divisible_bitwidth() {
        let batch = packed(&[(1, &[1, 0, 0, 0])], vec![]);
        let meta = surface_meta(&batch).expect("meta").expect("non-empty");
        assert_eq!(meta.dstream_s, 4);
        assert_eq!(meta.differentia_bitwidth, 4);

        let mut columns = batch.columns().to_vec();
        columns[3] = Arc::new(UInt8Array::from(vec![10]));
        let batch = RecordBatch::try_new(batch.schema(), columns).expect("swap bitwidth");
        assert!(matches!(
            surface_meta(&batch),
            Err(ReconstructError::BitwidthMismatch { .. })
        ));
    }
}
