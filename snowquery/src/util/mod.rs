//! Utilities for converting row-major tabular data into Apache Arrow.
//! Used by database client implementations.

mod arrow_reader;
pub mod coerce;
mod row_writer;

pub use arrow_reader::ArrowReader;
pub use row_writer::{collect_rows_to_arrow, ArrowRowWriter, Cell, RowsReader};
