//! Provides `snowquery` traits for [duckdb crate](https://docs.rs/duckdb) and the
//! table operations of the local cache store.

mod append;
mod schema;

use std::path::Path;

pub use append::DuckDBAppender;
pub use schema::{count_rows, quote_ident, table_create, table_exists, type_arrow_into_db, CreateMode};

use arrow::record_batch::RecordBatch;

use crate::api::Connector;
use crate::errors::ConnectorError;
use crate::util::ArrowReader;

/// Open the database file for reading only. The file must exist.
pub fn open_read_only(path: &Path) -> Result<duckdb::Connection, ConnectorError> {
    log::debug!("opening duckdb database {} (read only)", path.display());

    let config = duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?;
    duckdb::Connection::open_with_flags(path, config).map_err(|e| ConnectorError::FileOpen {
        path: path.to_path_buf(),
        source: Box::new(e.into()),
    })
}

/// Open (and create, if needed) the database file for reading and writing.
pub fn open(path: &Path) -> Result<duckdb::Connection, ConnectorError> {
    log::debug!("opening duckdb database {}", path.display());

    duckdb::Connection::open(path).map_err(|e| ConnectorError::FileOpen {
        path: path.to_path_buf(),
        source: Box::new(e.into()),
    })
}

impl Connector for duckdb::Connection {
    type Reader<'conn> = ArrowReader where Self: 'conn;

    fn query<'a>(&'a mut self, query: &str) -> Result<Self::Reader<'a>, ConnectorError> {
        let mut stmt = self.prepare(query)?;

        let arrow = stmt.query_arrow([])?;
        let schema = arrow.get_schema();
        let batches: Vec<RecordBatch> = arrow.collect();

        Ok(ArrowReader::new(schema, batches))
    }
}
