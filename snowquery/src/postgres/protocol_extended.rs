use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::fallible_iterator::FallibleIterator;
use postgres::types::{FromSql, ToSql};
use postgres::{Row, RowIter};
use rust_decimal::Decimal;

use crate::api::{Connector, ResultReader};
use crate::errors::ConnectorError;
use crate::util::{ArrowRowWriter, Cell};

use super::types::{self, PgColumn};
use super::{PostgresConnection, PostgresError, ProtocolExtended};

const BATCH_SIZE: usize = 1024;

impl Connector for PostgresConnection<ProtocolExtended> {
    type Reader<'conn> = PostgresBatchStream<'conn> where Self: 'conn;

    fn query<'a>(&'a mut self, query: &str) -> Result<Self::Reader<'a>, ConnectorError> {
        let stmt = self
            .client
            .prepare(query)
            .map_err(PostgresError::from)?;
        let (schema, columns) = types::pg_stmt_to_arrow(&stmt, false)?;

        let rows = self
            .client
            .query_raw(&stmt, std::iter::empty::<&dyn ToSql>())
            .map_err(PostgresError::from)?;

        Ok(PostgresBatchStream {
            writer: ArrowRowWriter::new(schema.clone(), BATCH_SIZE),
            schema,
            columns,
            rows,
            done: false,
        })
    }
}

/// Reads rows from the server lazily and yields them in batches of 1024 rows.
pub struct PostgresBatchStream<'conn> {
    schema: SchemaRef,
    columns: Vec<PgColumn>,
    rows: RowIter<'conn>,
    writer: ArrowRowWriter,
    done: bool,
}

impl PostgresBatchStream<'_> {
    fn next_batch(&mut self) -> Result<Option<RecordBatch>, ConnectorError> {
        while !self.done && self.writer.len() < BATCH_SIZE {
            match self.rows.next().map_err(PostgresError::from)? {
                Some(row) => {
                    let cells = read_row(&row, &self.columns).map_err(PostgresError::from)?;
                    self.writer.push_row(cells)?;
                }
                None => self.done = true,
            }
        }
        self.writer.flush()
    }
}

impl ResultReader for PostgresBatchStream<'_> {
    fn get_schema(&mut self) -> Result<SchemaRef, ConnectorError> {
        Ok(self.schema.clone())
    }
}

impl Iterator for PostgresBatchStream<'_> {
    type Item = Result<RecordBatch, ConnectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

fn get<'a, T, F>(row: &'a Row, idx: usize, into_cell: F) -> Result<Cell, postgres::Error>
where
    T: FromSql<'a>,
    F: FnOnce(T) -> Cell,
{
    Ok(row
        .try_get::<_, Option<T>>(idx)?
        .map(into_cell)
        .unwrap_or(Cell::Null))
}

fn read_row(row: &Row, columns: &[PgColumn]) -> Result<Vec<Cell>, postgres::Error> {
    let mut cells = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let cell = match column {
            PgColumn::Bool => get(row, idx, Cell::Bool)?,
            PgColumn::Int2 => get(row, idx, Cell::Int16)?,
            PgColumn::Int4 => get(row, idx, Cell::Int32)?,
            PgColumn::Int8 => get(row, idx, Cell::Int64)?,
            PgColumn::Oid => get(row, idx, |v: u32| Cell::Int64(v as i64))?,
            PgColumn::Float4 => get(row, idx, Cell::Float32)?,
            PgColumn::Float8 => get(row, idx, Cell::Float64)?,
            PgColumn::Numeric => get(row, idx, |v: Decimal| Cell::Text(v.to_string()))?,
            PgColumn::Text => get(row, idx, Cell::Text)?,
            PgColumn::Json => get(row, idx, |v: serde_json::Value| Cell::Text(v.to_string()))?,
            PgColumn::Uuid => get(row, idx, |v: uuid::Uuid| Cell::Text(v.to_string()))?,
            PgColumn::Bytea => get(row, idx, Cell::Binary)?,
            PgColumn::Timestamp => get(row, idx, |v: NaiveDateTime| {
                Cell::TimestampMicros(types::timestamp_micros(v))
            })?,
            PgColumn::TimestampTz => get(row, idx, |v: DateTime<Utc>| {
                Cell::TimestampMicros(v.timestamp_micros())
            })?,
            PgColumn::Date => get(row, idx, |v: NaiveDate| Cell::Date32(types::date_days(v)))?,
            PgColumn::Time => get(row, idx, |v: NaiveTime| Cell::Time64Micros(types::time_micros(v)))?,
        };
        cells.push(cell);
    }
    Ok(cells)
}
