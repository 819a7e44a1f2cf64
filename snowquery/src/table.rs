//! Materialized query results.

use std::fmt;

use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::api::ResultReader;
use crate::errors::ConnectorError;

/// A fully-read query result: its schema and all of its record batches.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Table { schema, batches }
    }

    /// Read the reader to its end.
    pub fn from_reader<R: ResultReader>(mut reader: R) -> Result<Self, ConnectorError> {
        let schema = reader.get_schema()?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        Ok(Table { schema, batches })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// Values of one column across all batches, or `None` if there is no such column.
    pub fn column(&self, name: &str) -> Option<ArrayRef> {
        let index = self.schema.index_of(name).ok()?;
        let arrays: Vec<&dyn arrow::array::Array> =
            self.batches.iter().map(|b| b.column(index).as_ref()).collect();

        if arrays.is_empty() {
            return Some(arrow::array::new_empty_array(
                self.schema.field(index).data_type(),
            ));
        }
        arrow::compute::concat(&arrays).ok()
    }

    /// Render the table as an ASCII grid.
    pub fn pretty(&self) -> Result<String, ConnectorError> {
        let grid = if self.batches.is_empty() {
            let empty = RecordBatch::new_empty(self.schema.clone());
            arrow::util::pretty::pretty_format_batches(&[empty])?
        } else {
            arrow::util::pretty::pretty_format_batches(&self.batches)?
        };
        Ok(grid.to_string())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pretty() {
            Ok(grid) => f.write_str(&grid),
            Err(_) => Err(fmt::Error),
        }
    }
}
