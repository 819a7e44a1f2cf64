use arrow::array::*;
use arrow::datatypes::*;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use duckdb::types::Value;
use duckdb::Appender;

use crate::api::Append;
use crate::errors::ConnectorError;

use super::schema::quote_ident;

/// Appends rows of [RecordBatch]es to an existing DuckDB table.
///
/// Columns must be in the same order as in the table.
pub struct DuckDBAppender<'conn> {
    inner: Appender<'conn>,
    rows: usize,
}

impl<'conn> DuckDBAppender<'conn> {
    pub fn new(conn: &'conn duckdb::Connection, table_name: &str) -> Result<Self, ConnectorError> {
        log::debug!("appending to {}", quote_ident(table_name));
        Ok(DuckDBAppender {
            inner: conn.appender(table_name)?,
            rows: 0,
        })
    }

    /// Number of rows appended so far.
    pub fn rows(&self) -> usize {
        self.rows
    }
}

impl<'conn> Append for DuckDBAppender<'conn> {
    fn append(&mut self, batch: RecordBatch) -> Result<(), ConnectorError> {
        let options = FormatOptions::default().with_display_error(true);
        let columns = batch
            .columns()
            .iter()
            .map(|array| ColumnReader::new(array.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()?;

        for row_index in 0..batch.num_rows() {
            let row: Vec<Value> = columns.iter().map(|c| c.value(row_index)).collect();
            self.inner.append_row(duckdb::appender_params_from_iter(row))?;
        }
        self.rows += batch.num_rows();

        Ok(())
    }

    fn finish(self) -> Result<(), ConnectorError> {
        // dropping the appender flushes the rows into the table
        drop(self.inner);
        Ok(())
    }
}

/// Reads values of one column, either natively or as text.
enum ColumnReader<'a> {
    Native(&'a dyn Array),

    /// Temporal, decimal and nested values are handed to DuckDB as text,
    /// which casts them to the column type.
    Formatted(&'a dyn Array, ArrayFormatter<'a>),
}

impl<'a> ColumnReader<'a> {
    fn new(array: &'a dyn Array, options: &'a FormatOptions<'a>) -> Result<Self, ConnectorError> {
        Ok(match array.data_type() {
            DataType::Null
            | DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Binary
            | DataType::LargeBinary
            | DataType::FixedSizeBinary(_)
            | DataType::Utf8
            | DataType::LargeUtf8 => ColumnReader::Native(array),
            _ => ColumnReader::Formatted(array, ArrayFormatter::try_new(array, options)?),
        })
    }

    fn value(&self, i: usize) -> Value {
        match self {
            ColumnReader::Native(array) => convert_value(*array, i),
            ColumnReader::Formatted(array, _) if array.is_null(i) => Value::Null,
            ColumnReader::Formatted(_, formatter) => Value::Text(formatter.value(i).to_string()),
        }
    }
}

fn convert_value(arr: &dyn Array, i: usize) -> Value {
    if arr.is_null(i) {
        return Value::Null;
    }

    match arr.data_type() {
        DataType::Boolean => Value::Boolean(arr.as_boolean().value(i)),
        DataType::Int8 => Value::TinyInt(arr.as_primitive::<Int8Type>().value(i)),
        DataType::Int16 => Value::SmallInt(arr.as_primitive::<Int16Type>().value(i)),
        DataType::Int32 => Value::Int(arr.as_primitive::<Int32Type>().value(i)),
        DataType::Int64 => Value::BigInt(arr.as_primitive::<Int64Type>().value(i)),
        DataType::UInt8 => Value::UTinyInt(arr.as_primitive::<UInt8Type>().value(i)),
        DataType::UInt16 => Value::USmallInt(arr.as_primitive::<UInt16Type>().value(i)),
        DataType::UInt32 => Value::UInt(arr.as_primitive::<UInt32Type>().value(i)),
        DataType::UInt64 => Value::UBigInt(arr.as_primitive::<UInt64Type>().value(i)),
        DataType::Float16 => Value::Float(arr.as_primitive::<Float16Type>().value(i).to_f32()),
        DataType::Float32 => Value::Float(arr.as_primitive::<Float32Type>().value(i)),
        DataType::Float64 => Value::Double(arr.as_primitive::<Float64Type>().value(i)),
        DataType::Binary => Value::Blob(arr.as_binary::<i32>().value(i).to_vec()),
        DataType::FixedSizeBinary(_) => Value::Blob(arr.as_fixed_size_binary().value(i).to_vec()),
        DataType::LargeBinary => Value::Blob(arr.as_binary::<i64>().value(i).to_vec()),
        DataType::Utf8 => Value::Text(arr.as_string::<i32>().value(i).to_string()),
        DataType::LargeUtf8 => Value::Text(arr.as_string::<i64>().value(i).to_string()),
        // Null and all other types are read through ColumnReader::Formatted
        _ => Value::Null,
    }
}
