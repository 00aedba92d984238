//! Column access helpers over Arrow record batches.
//!
//! Integer columns of any integer type are cast to `UInt64`; string columns
//! may be `Utf8`, `LargeUtf8` or dictionary-encoded.

use std::borrow::Cow;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, RecordBatch, StringArray, UInt64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, UInt64Type};

use crate::constants::{COL_DATA_HEX, RESERVED_PREFIXES};
use crate::error::{ReconstructError, Result};

fn column<'a>(batch: &'a RecordBatch, name: &'static str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or(ReconstructError::MissingColumn {
            column: Cow::Borrowed(name),
        })
}

/// Required unsigned integer column.
pub fn u64_column(batch: &RecordBatch, name: &'static str) -> Result<UInt64Array> {
    to_u64(column(batch, name)?, name)
}

/// Optional unsigned integer column; `None` when absent.
pub fn optional_u64_column(batch: &RecordBatch, name: &'static str) -> Result<Option<UInt64Array>> {
    batch
        .column_by_name(name)
        .map(|array| to_u64(array, name))
        .transpose()
}

/// Required unsigned integer column that may hold nulls.
pub fn nullable_u64_column(batch: &RecordBatch, name: &'static str) -> Result<UInt64Array> {
    let array = column(batch, name)?;
    let cast = cast_u64(array, name)?;
    if cast.null_count() > array.null_count() {
        return Err(negative(name));
    }
    Ok(cast.as_primitive::<UInt64Type>().clone())
}

fn negative(name: &'static str) -> ReconstructError {
    ReconstructError::InvalidColumn {
        column: Cow::Borrowed(name),
        reason: "negative values are not allowed".into(),
    }
}

fn cast_u64(array: &ArrayRef, name: &'static str) -> Result<ArrayRef> {
    if !array.data_type().is_integer() && array.data_type() != &DataType::Null {
        return Err(ReconstructError::InvalidColumn {
            column: Cow::Borrowed(name),
            reason: format!("expected integers, found {}", array.data_type()).into(),
        });
    }
    Ok(cast(array, &DataType::UInt64)?)
}

fn to_u64(array: &ArrayRef, name: &'static str) -> Result<UInt64Array> {
    let cast = cast_u64(array, name)?;
    // A safe cast turns negative values into nulls.
    if cast.null_count() > array.null_count() {
        return Err(negative(name));
    }
    if cast.null_count() > 0 {
        return Err(ReconstructError::InvalidColumn {
            column: Cow::Borrowed(name),
            reason: "null values are not allowed".into(),
        });
    }
    Ok(cast.as_primitive::<UInt64Type>().clone())
}

/// Required string column.
pub fn string_column(batch: &RecordBatch, name: &'static str) -> Result<StringArray> {
    let array = column(batch, name)?;
    let cast = cast(array, &DataType::Utf8).map_err(|err| ReconstructError::InvalidColumn {
        column: Cow::Borrowed(name),
        reason: err.to_string().into(),
    })?;
    Ok(cast.as_string::<i32>().clone())
}

/// Optional boolean filter column; nulls read as `false`.
pub fn optional_bool_column(batch: &RecordBatch, name: &'static str) -> Result<Option<BooleanArray>> {
    let Some(array) = batch.column_by_name(name) else {
        return Ok(None);
    };
    let cast = cast(array, &DataType::Boolean).map_err(|err| ReconstructError::InvalidColumn {
        column: Cow::Borrowed(name),
        reason: err.to_string().into(),
    })?;
    Ok(Some(cast.as_boolean().clone()))
}

#[inline]
pub(crate) fn flag_set(flags: Option<&BooleanArray>, row: usize) -> bool {
    flags.is_some_and(|flags| flags.is_valid(row) && flags.value(row))
}

/// The single value held by every row of `name`, or `None` for an empty batch.
pub fn scalar_u64(batch: &RecordBatch, name: &'static str) -> Result<Option<u64>> {
    let values = u64_column(batch, name)?;
    let Some(&first) = values.values().first() else {
        return Ok(None);
    };
    if values.values().iter().any(|&value| value != first) {
        return Err(ReconstructError::InconsistentScalar {
            column: Cow::Borrowed(name),
        });
    }
    Ok(Some(first))
}

/// Whether a column is carried through to the output.
#[must_use]
pub fn is_passthrough(name: &str) -> bool {
    name != COL_DATA_HEX && !RESERVED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Fields of `schema` that are carried through to the output, made nullable.
#[must_use]
pub fn passthrough_fields(schema: &Schema) -> Vec<(usize, Arc<Field>)> {
    schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, field)| is_passthrough(field.name()))
        .map(|(index, field)| (index, Arc::new(field.as_ref().clone().with_nullable(true))))
        .collect()
}

/// Project `batch` onto the given column indices, keeping their (nullable) fields.
pub fn project(batch: &RecordBatch, columns: &[(usize, Arc<Field>)]) -> Result<RecordBatch> {
    let fields: Vec<Arc<Field>> = columns.iter().map(|(_, field)| Arc::clone(field)).collect();
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(index, _)| Arc::clone(batch.column(*index)))
        .collect();
    let schema: SchemaRef = Arc::new(Schema::new(fields));
    if arrays.is_empty() {
        let options = arrow::array::RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
        return Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?);
    }
    Ok(RecordBatch::try_new(schema, arrays)?)
}

/// Build a `UInt64` array from owned values.
#[must_use]
pub fn u64_array(values: Vec<u64>) -> ArrayRef {
    Arc::new(UInt64Array::from(values))
}
