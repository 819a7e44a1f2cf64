//! Database client interface that uses Apache Arrow as data-transfer format and schema definition format.
//!
//! The important traits are:
//! - [Connector], providing [Connector::query],
//! - [ResultReader], the schema and the stream of [RecordBatch]es of a query,
//! - [Append], for writing [RecordBatch]es into a table.

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::errors::ConnectorError;

/// A connection to a data store.
pub trait Connector {
    type Reader<'conn>: ResultReader
    where
        Self: 'conn;

    /// Execute a query, using data store's preferred query language, and start reading its result.
    fn query<'a>(&'a mut self, query: &str) -> Result<Self::Reader<'a>, ConnectorError>;
}

/// Reads result of the query, starting with the schema.
pub trait ResultReader: Iterator<Item = Result<RecordBatch, ConnectorError>> {
    /// Return the schema of the result.
    fn get_schema(&mut self) -> Result<SchemaRef, ConnectorError>;
}

impl<R: ResultReader + ?Sized> ResultReader for Box<R> {
    fn get_schema(&mut self) -> Result<SchemaRef, ConnectorError> {
        (**self).get_schema()
    }
}

/// Receive [RecordBatch]es that have to be written to a table in the data store.
pub trait Append {
    fn append(&mut self, batch: RecordBatch) -> Result<(), ConnectorError>;

    fn finish(self) -> Result<(), ConnectorError>;
}
