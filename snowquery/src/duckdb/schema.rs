use arrow::datatypes::{DataType, SchemaRef};
use itertools::Itertools;

use crate::errors::ConnectorError;

/// Quote an identifier for use in DuckDB SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// How [table_create] treats an existing table of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Drop the existing table.
    Replace,
    /// Keep the existing table and its rows.
    IfNotExists,
    /// Replace a temporary table, visible only to this connection. Tables of the
    /// same name in the database are left alone.
    Temporary,
}

/// Create a table with columns matching `schema`.
///
/// A schema without fields results in a table with a single nullable placeholder column,
/// as DuckDB tables must have at least one column.
pub fn table_create(
    conn: &duckdb::Connection,
    name: &str,
    schema: &SchemaRef,
    mode: CreateMode,
) -> Result<(), ConnectorError> {
    let column_defs = if schema.fields().is_empty() {
        "\"placeholder\" INTEGER".to_string()
    } else {
        schema
            .fields()
            .iter()
            .map(|field| {
                let ty = type_arrow_into_db(field.data_type())
                    .ok_or_else(|| ConnectorError::UnsupportedArrowType(field.data_type().clone()))?;
                Ok(format!("{} {ty}", quote_ident(field.name())))
            })
            .collect::<Result<Vec<_>, ConnectorError>>()?
            .into_iter()
            .join(", ")
    };

    let name = quote_ident(name);
    let ddl = match mode {
        CreateMode::Replace => format!("CREATE OR REPLACE TABLE {name} ({column_defs});"),
        CreateMode::IfNotExists => format!("CREATE TABLE IF NOT EXISTS {name} ({column_defs});"),
        CreateMode::Temporary => format!("CREATE OR REPLACE TEMP TABLE {name} ({column_defs});"),
    };
    log::debug!("{ddl}");

    conn.execute_batch(&ddl)?;
    Ok(())
}

pub fn table_exists(conn: &duckdb::Connection, name: &str) -> Result<bool, ConnectorError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn count_rows(conn: &duckdb::Connection, name: &str) -> Result<u64, ConnectorError> {
    let query = format!("SELECT COUNT(*) FROM {}", quote_ident(name));
    let count: i64 = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(count as u64)
}

/// DuckDB column type used to store values of an Arrow type.
///
/// Types without a DuckDB counterpart are stored as their textual rendering.
pub fn type_arrow_into_db(ty: &DataType) -> Option<String> {
    let s = match ty {
        // there is no Null type in DuckDB, so we fallback to some other type that is nullable
        DataType::Null => "BIGINT",

        DataType::Boolean => "BOOLEAN",
        DataType::Int8 => "TINYINT",
        DataType::Int16 => "SMALLINT",
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::UInt8 => "UTINYINT",
        DataType::UInt16 => "USMALLINT",
        DataType::UInt32 => "UINTEGER",
        DataType::UInt64 => "UBIGINT",
        DataType::Float16 => "REAL",
        DataType::Float32 => "REAL",
        DataType::Float64 => "DOUBLE",

        DataType::Timestamp(_, None) => "TIMESTAMP",
        DataType::Timestamp(_, Some(_)) => "TIMESTAMPTZ",
        DataType::Date32 => "DATE",
        DataType::Date64 => "TIMESTAMP",
        DataType::Time32(_) => "TIME",
        DataType::Time64(_) => "TIME",

        DataType::Decimal128(precision, scale) if *precision <= 38 => {
            return Some(format!("DECIMAL({precision}, {scale})"))
        }
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => "VARCHAR",

        DataType::Binary | DataType::FixedSizeBinary(_) | DataType::LargeBinary => "BLOB",
        DataType::Utf8 | DataType::LargeUtf8 => "VARCHAR",

        DataType::Duration(_)
        | DataType::Interval(_)
        | DataType::List(_)
        | DataType::LargeList(_)
        | DataType::FixedSizeList(_, _)
        | DataType::Struct(_)
        | DataType::Map(_, _)
        | DataType::Dictionary(_, _) => "VARCHAR",

        _ => return None,
    };
    Some(s.to_string())
}
