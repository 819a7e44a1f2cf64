//! Writing query results into tables of the local DuckDB store.
//!
//! There are two ways results get there:
//! - [stream_batches] writes each batch of a Snowflake cursor as it arrives. An
//!   interrupted stream leaves the batches written so far in the table.
//! - [materialize] stages a lazy [ResultReader] and moves its rows into the
//!   destination table within a single DuckDB transaction.

use std::fmt;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::api::{Append, ResultReader};
use crate::config::BackendKind;
use crate::duckdb::{count_rows, quote_ident, table_create, table_exists, CreateMode, DuckDBAppender};
use crate::errors::{CacheError, ConnectorError};
use crate::snowflake::SnowflakeCursor;
use crate::util::coerce;

/// Outcome of caching a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheReport {
    pub table: String,

    /// Number of rows in the table after the write.
    pub rows: u64,
}

impl fmt::Display for CacheReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Successfully cached {} rows to DuckDB table '{}'.",
            self.rows, self.table
        )
    }
}

/// Table names must be plain identifiers: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_table_name(name: &str) -> Result<(), CacheError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidTableName(name.to_string()))
    }
}

/// Whether results of `source` can be cached at all.
pub fn check_source(source: BackendKind) -> Result<(), CacheError> {
    match source {
        BackendKind::DuckDB => Err(CacheError::SelfCache),
        BackendKind::SQLite => Err(CacheError::UnsupportedSource(source)),
        BackendKind::Snowflake | BackendKind::Postgres | BackendKind::Redshift => Ok(()),
    }
}

fn driver<'a, E: Into<ConnectorError>>(
    table: &'a str,
    stage: &'static str,
) -> impl FnOnce(E) -> CacheError + 'a {
    move |e| CacheError::Driver {
        table: table.to_string(),
        stage,
        source: e.into(),
    }
}

/// Execute `sql` on the cursor and write the result into `dest` batch by batch.
///
/// The first non-empty batch replaces the table when `overwrite` is set and is
/// appended otherwise. All later batches are appended. Without batch support in
/// the cursor, the whole result is fetched and written at once.
pub fn stream_batches(
    cursor: &mut dyn SnowflakeCursor,
    sql: &str,
    store: &duckdb::Connection,
    dest: &str,
    overwrite: bool,
) -> Result<CacheReport, CacheError> {
    validate_table_name(dest)?;

    cursor.execute(sql).map_err(driver(dest, "executing the query"))?;

    let streamed = match cursor.batches() {
        Some(reader) => {
            let reader = reader.map_err(driver(dest, "fetching batches"))?;
            Some(write_each_batch(reader, store, dest, overwrite)?)
        }
        None => None,
    };

    let (schema, written) = match streamed {
        Some(streamed) => streamed,
        None => {
            log::debug!("cursor cannot fetch batches, fetching the whole result");
            let table = cursor.fetch_all().map_err(driver(dest, "fetching results"))?;
            let table = crate::connection::flatten_lists(table)
                .map_err(driver(dest, "fetching results"))?;

            let schema = table.schema().clone();
            let batches: Vec<_> = table
                .into_batches()
                .into_iter()
                .filter(|b| b.num_rows() > 0)
                .collect();
            let written = if batches.is_empty() {
                0
            } else {
                write(store, dest, &schema, batches, overwrite)?
            };
            (schema, written)
        }
    };

    if written == 0 {
        // the table must exist, even when there was nothing to write
        let mode = if overwrite {
            CreateMode::Replace
        } else {
            CreateMode::IfNotExists
        };
        table_create(store, dest, &schema, mode).map_err(driver(dest, "creating the table"))?;
    }

    report(store, dest)
}

fn write_each_batch(
    mut reader: Box<dyn ResultReader + '_>,
    store: &duckdb::Connection,
    dest: &str,
    overwrite: bool,
) -> Result<(SchemaRef, usize), CacheError> {
    let schema = reader
        .get_schema()
        .map_err(driver(dest, "fetching batches"))?;
    let schema = coerce::flatten_lists_schema(&schema);

    let mut written = 0;
    for batch in reader {
        let batch = batch.map_err(driver(dest, "fetching batches"))?;
        if batch.num_rows() == 0 {
            continue;
        }
        let batch = coerce::flatten_lists(&batch).map_err(driver(dest, "fetching batches"))?;

        let replace = overwrite && written == 0;
        written += write(store, dest, &batch.schema(), vec![batch], replace)?;
        log::debug!("{written} rows written to {dest}");
    }
    Ok((schema, written))
}

/// One write: create or replace the table, then append the batches.
fn write(
    store: &duckdb::Connection,
    dest: &str,
    schema: &SchemaRef,
    batches: Vec<RecordBatch>,
    replace: bool,
) -> Result<usize, CacheError> {
    let mode = if replace {
        CreateMode::Replace
    } else {
        CreateMode::IfNotExists
    };
    table_create(store, dest, schema, mode).map_err(driver(dest, "creating the table"))?;

    let mut appender = DuckDBAppender::new(store, dest).map_err(driver(dest, "appending rows"))?;
    for batch in batches {
        appender
            .append(batch)
            .map_err(driver(dest, "appending rows"))?;
    }
    let rows = appender.rows();
    appender.finish().map_err(driver(dest, "appending rows"))?;
    Ok(rows)
}

/// Move all rows of `reader` into `dest`, within one transaction of `store`.
///
/// The rows are first appended to a staging table, from which DuckDB then
/// replaces or extends `dest`. A failure at any point rolls everything back.
pub fn materialize<R: ResultReader>(
    mut reader: R,
    store: &mut duckdb::Connection,
    dest: &str,
    overwrite: bool,
) -> Result<CacheReport, CacheError> {
    validate_table_name(dest)?;

    let schema = reader
        .get_schema()
        .map_err(driver(dest, "reading the result schema"))?;
    let stage = format!("snowquery_stage_{dest}");
    let dest_q = quote_ident(dest);
    let stage_q = format!("temp.main.{}", quote_ident(&stage));

    let tx = store
        .transaction()
        .map_err(driver(dest, "starting a transaction"))?;

    table_create(&tx, &stage, &schema, CreateMode::Temporary)
        .map_err(driver(dest, "creating the staging table"))?;
    {
        let mut appender =
            DuckDBAppender::new(&tx, &stage).map_err(driver(dest, "staging rows"))?;
        for batch in reader.by_ref() {
            let batch = batch.map_err(driver(dest, "reading the source"))?;
            appender.append(batch).map_err(driver(dest, "staging rows"))?;
        }
        log::debug!("{} rows staged in {stage_q}", appender.rows());
        appender.finish().map_err(driver(dest, "staging rows"))?;
    }

    let sql = if overwrite {
        format!("CREATE OR REPLACE TABLE {dest_q} AS SELECT * FROM {stage_q};")
    } else {
        let exists = table_exists(&tx, dest).map_err(driver(dest, "inspecting the store"))?;
        let create = if exists {
            String::new()
        } else {
            format!("CREATE TABLE {dest_q} AS SELECT * FROM {stage_q} LIMIT 0;\n")
        };
        format!("{create}INSERT INTO {dest_q} SELECT * FROM {stage_q};")
    };
    log::debug!("{sql}");
    tx.execute_batch(&sql).map_err(driver(dest, "writing the table"))?;
    tx.execute_batch(&format!("DROP TABLE {stage_q};"))
        .map_err(driver(dest, "dropping the staging table"))?;

    tx.commit().map_err(driver(dest, "committing"))?;

    report(store, dest)
}

fn report(store: &duckdb::Connection, dest: &str) -> Result<CacheReport, CacheError> {
    let rows = count_rows(store, dest).map_err(driver(dest, "counting rows"))?;

    let report = CacheReport {
        table: dest.to_string(),
        rows,
    };
    log::info!("{report}");
    Ok(report)
}
