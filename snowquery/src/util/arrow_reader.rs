use std::collections::VecDeque;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::api::ResultReader;
use crate::errors::ConnectorError;
use crate::table::Table;

/// [ResultReader] over batches that were fully read before the reader was handed out.
///
/// SQLite, DuckDB and the simple Postgres protocol return this.
pub struct ArrowReader {
    schema: SchemaRef,
    pending: VecDeque<RecordBatch>,
}

impl ArrowReader {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        ArrowReader {
            schema,
            pending: batches.into(),
        }
    }

    /// Rows not yet returned by the iterator.
    pub fn remaining_rows(&self) -> usize {
        self.pending.iter().map(RecordBatch::num_rows).sum()
    }
}

impl From<Table> for ArrowReader {
    fn from(table: Table) -> Self {
        let schema = table.schema().clone();
        ArrowReader::new(schema, table.into_batches())
    }
}

impl Iterator for ArrowReader {
    type Item = Result<RecordBatch, ConnectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pending.pop_front().map(Ok)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), Some(self.pending.len()))
    }
}

impl ResultReader for ArrowReader {
    fn get_schema(&mut self) -> Result<SchemaRef, ConnectorError> {
        Ok(self.schema.clone())
    }
}
