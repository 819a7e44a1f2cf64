use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use itertools::zip_eq;
use rusqlite::types::Value;

use crate::api::Connector;
use crate::errors::ConnectorError;
use crate::util::{collect_rows_to_arrow, ArrowReader, Cell, RowsReader};

use super::types;

impl Connector for rusqlite::Connection {
    type Reader<'conn> = ArrowReader where Self: 'conn;

    fn query<'a>(&'a mut self, query: &str) -> Result<Self::Reader<'a>, ConnectorError> {
        let mut stmt = self.prepare(query)?;

        let column_count = stmt.column_count();
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let decl_types: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().map(String::from))
            .collect();

        let rows: Vec<Vec<Value>> = {
            let mut rows_iter = stmt.query([])?;

            // read all of the rows into a buffer
            let mut rows = Vec::with_capacity(1024);
            while let Some(row_ref) = rows_iter.next()? {
                let mut row = Vec::with_capacity(column_count);
                for col_index in 0..column_count {
                    row.push(row_ref.get::<_, Value>(col_index)?);
                }
                rows.push(row);
            }
            rows
        };

        let schema = infer_schema(names, decl_types, &rows);

        // iterate over rows and convert into arrow
        let mut rows = SQLiteRowsReader {
            rows: rows.into_iter(),
        };
        let batches = collect_rows_to_arrow(schema.clone(), &mut rows, 1024)?;

        Ok(ArrowReader::new(schema, batches))
    }
}

fn infer_schema(
    names: Vec<String>,
    decl_types: Vec<Option<String>>,
    rows: &[Vec<Value>],
) -> SchemaRef {
    let mut types: Vec<Option<DataType>> = vec![None; names.len()];

    for row in rows {
        for (ty, cell) in types.iter_mut().zip(row) {
            *ty = types::widen(ty.take(), types::ty_to_arrow(cell.data_type()));
        }
    }

    let fields: Vec<Field> = zip_eq(zip_eq(names, decl_types), types)
        .map(|((name, decl_ty), ty)| {
            let ty = ty
                .or_else(|| decl_ty.as_deref().and_then(types::decl_ty_to_arrow))
                .unwrap_or(DataType::Null);

            let nullable = true; // dynamic type system FTW
            Field::new(name, ty, nullable)
        })
        .collect();

    Arc::new(Schema::new(fields))
}

struct SQLiteRowsReader {
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl RowsReader for SQLiteRowsReader {
    fn next_row(&mut self) -> Result<Option<Vec<Cell>>, ConnectorError> {
        Ok(self
            .rows
            .next()
            .map(|row| row.into_iter().map(into_cell).collect()))
    }
}

fn into_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Integer(v) => Cell::Int64(v),
        Value::Real(v) => Cell::Float64(v),
        Value::Text(v) => Cell::Text(v),
        Value::Blob(v) => Cell::Binary(v),
    }
}
