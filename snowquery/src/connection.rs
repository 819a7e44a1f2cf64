//! Live connections to any of the supported backends.

use std::time::Duration;

use crate::config::{BackendKind, ResolvedConnection, Settings};
use crate::errors::ConnectorError;
use crate::postgres::{PostgresConnection, ProtocolExtended, ProtocolSimple};
use crate::snowflake::{SnowflakeConnection, SnowflakeDriver};
use crate::table::Table;
use crate::util::coerce;

/// An open connection, owning the resources of its driver.
///
/// Dropping it releases the connection. [Connection::close] does the same,
/// but reports errors of closing.
pub enum Connection {
    Snowflake(Box<dyn SnowflakeConnection>),
    Postgres(PostgresConnection<ProtocolExtended>),
    Redshift(PostgresConnection<ProtocolSimple>),
    SQLite(rusqlite::Connection),
    DuckDB(duckdb::Connection),
}

impl Connection {
    pub fn open(
        resolved: &ResolvedConnection,
        settings: &Settings,
        timeout: Duration,
        snowflake: &dyn SnowflakeDriver,
    ) -> Result<Self, ConnectorError> {
        Ok(match resolved {
            ResolvedConnection::Snowflake(params) => {
                Connection::Snowflake(snowflake.connect(params, timeout)?)
            }
            ResolvedConnection::Postgres(params) => {
                let client = crate::postgres::connect(params, timeout)?;
                Connection::Postgres(PostgresConnection::new(client))
            }
            ResolvedConnection::Redshift(params) => {
                let client = crate::postgres::connect(params, timeout)?;
                Connection::Redshift(PostgresConnection::new(client))
            }
            ResolvedConnection::SQLite(params) => {
                Connection::SQLite(crate::sqlite::open(&params.path)?)
            }
            ResolvedConnection::DuckDB => {
                Connection::DuckDB(crate::duckdb::open_read_only(&settings.cache_path)?)
            }
        })
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Connection::Snowflake(_) => BackendKind::Snowflake,
            Connection::Postgres(_) => BackendKind::Postgres,
            Connection::Redshift(_) => BackendKind::Redshift,
            Connection::SQLite(_) => BackendKind::SQLite,
            Connection::DuckDB(_) => BackendKind::DuckDB,
        }
    }

    /// Execute a statement and read its whole result.
    pub fn execute(&mut self, sql: &str) -> Result<Table, ConnectorError> {
        log::debug!("executing on {}: {sql}", self.kind());

        match self {
            Connection::Snowflake(conn) => {
                let mut cursor = conn.cursor()?;
                cursor.execute(sql)?;
                let table = cursor.fetch_all()?;
                cursor.close()?;
                flatten_lists(table)
            }
            Connection::Postgres(conn) => crate::query(conn, sql),
            Connection::Redshift(conn) => crate::query(conn, sql),
            Connection::SQLite(conn) => crate::query(conn, sql),
            Connection::DuckDB(conn) => crate::query(conn, sql),
        }
    }

    pub fn close(self) -> Result<(), ConnectorError> {
        match self {
            Connection::Snowflake(conn) => conn.close(),
            Connection::Postgres(conn) => conn.close(),
            Connection::Redshift(conn) => conn.close(),
            Connection::SQLite(conn) => conn.close().map_err(|(_, e)| e.into()),
            Connection::DuckDB(conn) => conn.close().map_err(|(_, e)| e.into()),
        }
    }
}

/// Render list-valued columns of a Snowflake result as text.
pub(crate) fn flatten_lists(table: Table) -> Result<Table, ConnectorError> {
    let schema = coerce::flatten_lists_schema(table.schema());
    let batches = table
        .batches()
        .iter()
        .map(coerce::flatten_lists)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Table::new(schema, batches))
}
