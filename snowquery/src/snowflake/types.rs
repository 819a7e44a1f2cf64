use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use serde::Deserialize;

/// One entry of the cursor description, as sent by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnDescription {
    pub name: String,

    /// Snowflake type name, such as `FIXED`, `TEXT` or `TIMESTAMP_NTZ`.
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub precision: Option<u8>,

    #[serde(default)]
    pub scale: Option<i8>,

    #[serde(default = "nullable_by_default")]
    pub nullable: bool,
}

fn nullable_by_default() -> bool {
    true
}

/// Arrow type of a Snowflake column, matching what the connector's Arrow result uses.
///
/// Semi-structured values are delivered as JSON text.
pub fn snowflake_to_arrow(column: &ColumnDescription) -> DataType {
    match column.type_name.as_str() {
        "FIXED" => match (column.precision, column.scale.unwrap_or(0)) {
            (_, 0) => DataType::Int64,
            (precision, scale) => DataType::Decimal128(precision.unwrap_or(38).clamp(1, 38), scale),
        },
        "REAL" => DataType::Float64,
        "BOOLEAN" => DataType::Boolean,
        "BINARY" => DataType::Binary,
        "DATE" => DataType::Date32,
        "TIME" => DataType::Time64(TimeUnit::Nanosecond),
        "TIMESTAMP_NTZ" => DataType::Timestamp(TimeUnit::Nanosecond, None),
        "TIMESTAMP_LTZ" | "TIMESTAMP_TZ" => {
            DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
        }
        _ => DataType::Utf8,
    }
}

/// Schema of a result known only from its description, i.e. a result without rows.
pub fn description_to_schema(columns: &[ColumnDescription]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|c| Field::new(&c.name, snowflake_to_arrow(c), c.nullable))
        .collect();
    Arc::new(Schema::new(fields))
}
