//! Rewrites of Arrow data that some consumers cannot handle natively.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use itertools::Itertools;

/// Separator between the elements of a flattened list.
pub const LIST_SEPARATOR: &str = ", ";

pub fn is_list(ty: &DataType) -> bool {
    matches!(
        ty,
        DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _)
    )
}

/// Replace list-valued columns of the schema with `Utf8` columns.
pub fn flatten_lists_schema(schema: &SchemaRef) -> SchemaRef {
    if !schema.fields().iter().any(|f| is_list(f.data_type())) {
        return schema.clone();
    }

    Arc::new(Schema::new(
        schema
            .fields()
            .iter()
            .map(|f| {
                if is_list(f.data_type()) {
                    Field::new(f.name(), DataType::Utf8, true)
                } else {
                    Field::clone(f)
                }
            })
            .collect_vec(),
    ))
}

/// Render every list-valued cell as its elements joined by [LIST_SEPARATOR].
///
/// Batches without list columns are returned unchanged. Null lists stay null.
pub fn flatten_lists(batch: &RecordBatch) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    if !schema.fields().iter().any(|f| is_list(f.data_type())) {
        return Ok(batch.clone());
    }

    let columns = batch
        .columns()
        .iter()
        .map(|array| {
            if is_list(array.data_type()) {
                flatten_list_array(array.as_ref())
            } else {
                Ok(array.clone())
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    RecordBatch::try_new(flatten_lists_schema(&schema), columns)
}

fn flatten_list_array(array: &dyn Array) -> Result<ArrayRef, ArrowError> {
    let options = FormatOptions::default();
    let mut builder = StringBuilder::with_capacity(array.len(), array.len() * 8);

    for i in 0..array.len() {
        if array.is_null(i) {
            builder.append_null();
            continue;
        }
        let elements = match array.data_type() {
            DataType::List(_) => array.as_list::<i32>().value(i),
            DataType::LargeList(_) => array.as_list::<i64>().value(i),
            DataType::FixedSizeList(_, _) => array.as_fixed_size_list().value(i),
            ty => {
                return Err(ArrowError::CastError(format!(
                    "cannot flatten {ty} as a list"
                )))
            }
        };
        builder.append_value(join_elements(elements.as_ref(), &options)?);
    }

    Ok(Arc::new(builder.finish()))
}

fn join_elements(elements: &dyn Array, options: &FormatOptions) -> Result<String, ArrowError> {
    // nested lists are joined recursively, rather than printed with brackets
    let elements: ArrayRef = if is_list(elements.data_type()) {
        flatten_list_array(elements)?
    } else {
        arrow::array::make_array(elements.to_data())
    };

    let formatter = ArrayFormatter::try_new(elements.as_ref(), options)?;
    Ok((0..elements.len())
        .map(|j| formatter.value(j).to_string())
        .join(LIST_SEPARATOR))
}
