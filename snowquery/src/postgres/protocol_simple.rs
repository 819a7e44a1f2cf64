use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use postgres::{SimpleQueryMessage, SimpleQueryRow};

use crate::api::Connector;
use crate::errors::ConnectorError;
use crate::util::{collect_rows_to_arrow, ArrowReader, Cell, RowsReader};

use super::types::{self, PgColumn};
use super::{PostgresConnection, PostgresError, ProtocolSimple};

impl Connector for PostgresConnection<ProtocolSimple> {
    type Reader<'conn> = ArrowReader where Self: 'conn;

    fn query<'a>(&'a mut self, query: &str) -> Result<Self::Reader<'a>, ConnectorError> {
        // the statement is only prepared to learn the schema of the result
        let stmt = self
            .client
            .prepare(query)
            .map_err(PostgresError::from)?;
        let (schema, columns) = types::pg_stmt_to_arrow(&stmt, true)?;

        let messages = self
            .client
            .simple_query(query)
            .map_err(PostgresError::from)?;

        let row_count = messages.len();
        let mut row_reader = PostgresRowsReader {
            rows: messages.into_iter(),
            columns,
        };
        let batches = collect_rows_to_arrow(schema.clone(), &mut row_reader, row_count.max(1))?;

        Ok(ArrowReader::new(schema, batches))
    }
}

struct PostgresRowsReader {
    rows: std::vec::IntoIter<SimpleQueryMessage>,
    columns: Vec<PgColumn>,
}

impl RowsReader for PostgresRowsReader {
    fn next_row(&mut self) -> Result<Option<Vec<Cell>>, ConnectorError> {
        for message in self.rows.by_ref() {
            if let SimpleQueryMessage::Row(row) = message {
                return read_row(&row, &self.columns).map(Some);
            }
        }
        Ok(None)
    }
}

fn read_row(row: &SimpleQueryRow, columns: &[PgColumn]) -> Result<Vec<Cell>, ConnectorError> {
    if row.len() != columns.len() {
        return Err(ConnectorError::DataSchemaMismatch(format!(
            "expected {} columns, got {}",
            columns.len(),
            row.len()
        )));
    }

    let mut cells = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let cell = match row.get(idx) {
            None => Cell::Null,
            Some(token) => parse_cell(*column, token)?,
        };
        cells.push(cell);
    }
    Ok(cells)
}

fn bad_encoding(column: PgColumn, token: &str) -> ConnectorError {
    ConnectorError::DataSchemaMismatch(format!("bad {column:?} encoding: {token}"))
}

fn parse_cell(column: PgColumn, token: &str) -> Result<Cell, ConnectorError> {
    macro_rules! parse_number {
        ($variant: path) => {
            $variant(token.parse().map_err(|_| bad_encoding(column, token))?)
        };
    }

    Ok(match column {
        PgColumn::Bool => match token {
            "t" | "true" => Cell::Bool(true),
            "f" | "false" => Cell::Bool(false),
            _ => return Err(bad_encoding(column, token)),
        },
        PgColumn::Int2 => parse_number!(Cell::Int16),
        PgColumn::Int4 => parse_number!(Cell::Int32),
        PgColumn::Int8 | PgColumn::Oid => parse_number!(Cell::Int64),
        PgColumn::Float4 => parse_number!(Cell::Float32),
        PgColumn::Float8 => parse_number!(Cell::Float64),
        PgColumn::Numeric | PgColumn::Text | PgColumn::Json | PgColumn::Uuid => {
            Cell::Text(token.to_string())
        }
        PgColumn::Bytea => {
            let hex = token
                .strip_prefix("\\x")
                .ok_or_else(|| bad_encoding(column, token))?;
            Cell::Binary(hex::decode(hex).map_err(PostgresError::from)?)
        }
        PgColumn::Timestamp => {
            let ts = NaiveDateTime::parse_from_str(token, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(PostgresError::from)?;
            Cell::TimestampMicros(types::timestamp_micros(ts))
        }
        PgColumn::TimestampTz => {
            let ts = DateTime::parse_from_str(token, "%Y-%m-%d %H:%M:%S%.f%#z")
                .map_err(PostgresError::from)?;
            Cell::TimestampMicros(ts.timestamp_micros())
        }
        PgColumn::Date => {
            let date = NaiveDate::parse_from_str(token, "%Y-%m-%d").map_err(PostgresError::from)?;
            Cell::Date32(types::date_days(date))
        }
        PgColumn::Time => {
            let time = NaiveTime::parse_from_str(token, "%H:%M:%S%.f").map_err(PostgresError::from)?;
            Cell::Time64Micros(types::time_micros(time))
        }
    })
}
