use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use postgres::types::Type;

use crate::errors::ConnectorError;

/// Column types that are converted into Arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgColumn {
    Bool,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    Numeric,
    Text,
    Json,
    Uuid,
    Bytea,
    Timestamp,
    TimestampTz,
    Date,
    Time,
}

impl PgColumn {
    pub fn from_pg(ty: &Type) -> Option<Self> {
        Some(match ty.name() {
            "bool" => PgColumn::Bool,
            "int2" => PgColumn::Int2,
            "int4" => PgColumn::Int4,
            "int8" => PgColumn::Int8,
            "oid" => PgColumn::Oid,
            "float4" => PgColumn::Float4,
            "float8" => PgColumn::Float8,
            "numeric" => PgColumn::Numeric,
            "text" | "varchar" | "bpchar" | "name" | "unknown" => PgColumn::Text,
            "json" | "jsonb" => PgColumn::Json,
            "uuid" => PgColumn::Uuid,
            "bytea" => PgColumn::Bytea,
            "timestamp" => PgColumn::Timestamp,
            "timestamptz" => PgColumn::TimestampTz,
            "date" => PgColumn::Date,
            "time" => PgColumn::Time,
            _ => return None,
        })
    }

    pub fn arrow_type(&self) -> DataType {
        match self {
            PgColumn::Bool => DataType::Boolean,
            PgColumn::Int2 => DataType::Int16,
            PgColumn::Int4 => DataType::Int32,
            PgColumn::Int8 | PgColumn::Oid => DataType::Int64,
            PgColumn::Float4 => DataType::Float32,
            PgColumn::Float8 => DataType::Float64,
            PgColumn::Numeric | PgColumn::Text | PgColumn::Json | PgColumn::Uuid => DataType::Utf8,
            PgColumn::Bytea => DataType::Binary,
            PgColumn::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            PgColumn::TimestampTz => {
                DataType::Timestamp(TimeUnit::Microsecond, Some("+00:00".into()))
            }
            PgColumn::Date => DataType::Date32,
            PgColumn::Time => DataType::Time64(TimeUnit::Microsecond),
        }
    }
}

/// Arrow schema of a prepared statement, along with the column types to decode.
///
/// With `text_fallback`, columns of unknown types are read as text,
/// which is only possible with [super::ProtocolSimple].
pub fn pg_stmt_to_arrow(
    stmt: &postgres::Statement,
    text_fallback: bool,
) -> Result<(SchemaRef, Vec<PgColumn>), ConnectorError> {
    let mut fields = Vec::with_capacity(stmt.columns().len());
    let mut columns = Vec::with_capacity(stmt.columns().len());

    for col in stmt.columns() {
        let pg_column = match PgColumn::from_pg(col.type_()) {
            Some(c) => c,
            None if text_fallback => PgColumn::Text,
            None => {
                return Err(ConnectorError::IncompatibleSchema {
                    column: col.name().to_string(),
                    db_type: col.type_().name().to_string(),
                    hint: Some(format!("cast it to text: {}::text", col.name())),
                })
            }
        };
        fields.push(Field::new(col.name(), pg_column.arrow_type(), true));
        columns.push(pg_column);
    }
    Ok((Arc::new(Schema::new(fields)), columns))
}

// days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub fn timestamp_micros(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

pub fn date_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn time_micros(time: NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64 * 1_000_000 + (time.nanosecond() / 1_000) as i64
}
