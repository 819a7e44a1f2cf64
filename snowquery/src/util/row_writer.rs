use arrow::array::builder::*;
use arrow::array::{new_null_array, ArrayRef};
use arrow::datatypes::{DataType, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use fehler::{throw, throws};

use crate::errors::ConnectorError;

/// A single value read from a row-oriented driver, before it is placed into an Arrow array.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Binary(Vec<u8>),
    /// Microseconds since 1970-01-01T00:00:00.
    TimestampMicros(i64),
    /// Days since 1970-01-01.
    Date32(i32),
    /// Microseconds since midnight.
    Time64Micros(i64),
}

/// Iterator over rows.
// Cannot be an actual iterator, because drivers report errors per row.
pub trait RowsReader {
    fn next_row(&mut self) -> Result<Option<Vec<Cell>>, ConnectorError>;
}

/// Read all rows and convert them into batches of at least `min_batch_size` rows.
pub fn collect_rows_to_arrow<R: RowsReader>(
    schema: SchemaRef,
    rows_reader: &mut R,
    min_batch_size: usize,
) -> Result<Vec<RecordBatch>, ConnectorError> {
    let mut writer = ArrowRowWriter::new(schema, min_batch_size);
    log::debug!("reading rows");

    let mut batches = Vec::new();
    while let Some(row) = rows_reader.next_row()? {
        writer.push_row(row)?;

        if writer.len() >= min_batch_size {
            batches.extend(writer.flush()?);
        }
    }
    batches.extend(writer.flush()?);
    Ok(batches)
}

/// Receives values row-by-row and passes them to [ArrayBuilder]s,
/// which construct [RecordBatch]es.
pub struct ArrowRowWriter {
    schema: SchemaRef,

    /// Array buffers, one per field of the schema.
    builders: Vec<Box<dyn ArrayBuilder>>,

    /// Number of rows in the builders.
    rows: usize,
}

impl ArrowRowWriter {
    pub fn new(schema: SchemaRef, capacity: usize) -> Self {
        let builders = schema
            .fields()
            .iter()
            .map(|f| new_builder(f.data_type(), capacity))
            .collect();

        ArrowRowWriter {
            schema,
            builders,
            rows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[throws(ConnectorError)]
    pub fn push_row(&mut self, row: Vec<Cell>) {
        if row.len() != self.builders.len() {
            throw!(ConnectorError::DataSchemaMismatch(format!(
                "row has {} cells, schema has {} fields",
                row.len(),
                self.builders.len()
            )));
        }

        for ((builder, field), cell) in self
            .builders
            .iter_mut()
            .zip(self.schema.fields().iter())
            .zip(row)
        {
            append_cell(builder.as_mut(), field.data_type(), cell)?;
        }
        self.rows += 1;
    }

    /// Finish the arrays built so far into a batch. Returns `None` when no rows were pushed.
    pub fn flush(&mut self) -> Result<Option<RecordBatch>, ConnectorError> {
        if self.rows == 0 {
            return Ok(None);
        }

        let mut columns: Vec<ArrayRef> = Vec::with_capacity(self.builders.len());
        for (builder, field) in self.builders.iter_mut().zip(self.schema.fields().iter()) {
            // NullBuilder::finish does not reset its length
            if field.data_type() == &DataType::Null {
                *builder = new_builder(&DataType::Null, 0);
                columns.push(new_null_array(&DataType::Null, self.rows));
                continue;
            }

            let array = builder.finish();

            // builders don't carry all type parameters (i.e. timezones)
            let array = if array.data_type() != field.data_type() {
                arrow::compute::cast(&array, field.data_type())?
            } else {
                array
            };
            columns.push(array);
        }
        self.rows = 0;

        Ok(Some(RecordBatch::try_new(self.schema.clone(), columns)?))
    }
}

fn new_builder(ty: &DataType, capacity: usize) -> Box<dyn ArrayBuilder> {
    match ty {
        DataType::Null => Box::new(NullBuilder::new()),
        _ => make_builder(ty, capacity),
    }
}

fn mismatch(cell: &Cell, expected: &DataType) -> ConnectorError {
    ConnectorError::DataSchemaMismatch(format!("cannot store {cell:?} in a column of type {expected}"))
}

macro_rules! append {
    ($builder: expr, $Builder: ty, $value: expr) => {
        $builder
            .as_any_mut()
            .downcast_mut::<$Builder>()
            .ok_or_else(|| {
                ConnectorError::DataSchemaMismatch(format!(
                    "expected {} for this column",
                    stringify!($Builder)
                ))
            })?
            .append_option($value)
    };
}

fn append_cell(
    builder: &mut dyn ArrayBuilder,
    ty: &DataType,
    cell: Cell,
) -> Result<(), ConnectorError> {
    match ty {
        DataType::Null => match cell {
            Cell::Null => builder
                .as_any_mut()
                .downcast_mut::<NullBuilder>()
                .ok_or_else(|| {
                    ConnectorError::DataSchemaMismatch("expected NullBuilder for this column".into())
                })?
                .append_null(),
            other => return Err(mismatch(&other, ty)),
        },
        DataType::Boolean => {
            let value = match cell {
                Cell::Null => None,
                Cell::Bool(v) => Some(v),
                Cell::Int64(v) => Some(v != 0),
                other => return Err(mismatch(&other, ty)),
            };
            append!(builder, BooleanBuilder, value)
        }
        DataType::Int16 => {
            let value = match cell {
                Cell::Null => None,
                Cell::Int16(v) => Some(v),
                other => return Err(mismatch(&other, ty)),
            };
            append!(builder, Int16Builder, value)
        }
        DataType::Int32 => {
            let value = match cell {
                Cell::Null => None,
                Cell::Int16(v) => Some(v as i32),
                Cell::Int32(v) => Some(v),
                other => return Err(mismatch(&other, ty)),
            };
            append!(builder, Int32Builder, value)
        }
        DataType::Int64 => {
            let value = match cell {
                Cell::Null => None,
                Cell::Int16(v) => Some(v as i64),
                Cell::Int32(v) => Some(v as i64),
                Cell::Int64(v) => Some(v),
                other => return Err(mismatch(&other, ty)),
            };
            append!(builder, Int64Builder, value)
        }
        DataType::Float32 => {
            let value = match cell {
                Cell::Null => None,
                Cell::Float32(v) => Some(v),
                other => return Err(mismatch(&other, ty)),
            };
            append!(builder, Float32Builder, value)
        }
        DataType::Float64 => {
            let value = match cell {
                Cell::Null => None,
                Cell::Float32(v) => Some(v as f64),
                Cell::Float64(v) => Some(v),
                Cell::Int64(v) => Some(v as f64),
                other => return Err(mismatch(&other, ty)),
            };
            append!(builder, Float64Builder, value)
        }
        DataType::Utf8 => append!(builder, StringBuilder, text_of(cell, ty)?),
        DataType::LargeUtf8 => append!(builder, LargeStringBuilder, text_of(cell, ty)?),
        DataType::Binary => append!(builder, BinaryBuilder, bytes_of(cell, ty)?),
        DataType::LargeBinary => append!(builder, LargeBinaryBuilder, bytes_of(cell, ty)?),
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let value = match cell {
                Cell::Null => None,
                Cell::TimestampMicros(v) => Some(v),
                other => return Err(mismatch(&other, ty)),
            };
            append!(builder, TimestampMicrosecondBuilder, value)
        }
        DataType::Date32 => {
            let value = match cell {
                Cell::Null => None,
                Cell::Date32(v) => Some(v),
                other => return Err(mismatch(&other, ty)),
            };
            append!(builder, Date32Builder, value)
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            let value = match cell {
                Cell::Null => None,
                Cell::Time64Micros(v) => Some(v),
                other => return Err(mismatch(&other, ty)),
            };
            append!(builder, Time64MicrosecondBuilder, value)
        }
        _ => return Err(mismatch(&cell, ty)),
    }
    Ok(())
}

/// Text columns accept any scalar, as SQLite does not enforce column types.
fn text_of(cell: Cell, ty: &DataType) -> Result<Option<String>, ConnectorError> {
    Ok(match cell {
        Cell::Null => None,
        Cell::Text(v) => Some(v),
        Cell::Bool(v) => Some(v.to_string()),
        Cell::Int16(v) => Some(v.to_string()),
        Cell::Int32(v) => Some(v.to_string()),
        Cell::Int64(v) => Some(v.to_string()),
        Cell::Float32(v) => Some(v.to_string()),
        Cell::Float64(v) => Some(v.to_string()),
        other => return Err(mismatch(&other, ty)),
    })
}

fn bytes_of(cell: Cell, ty: &DataType) -> Result<Option<Vec<u8>>, ConnectorError> {
    Ok(match cell {
        Cell::Null => None,
        Cell::Binary(v) => Some(v),
        other => text_of(other, ty)?.map(String::into_bytes),
    })
}
