use arrow::datatypes::DataType;
use rusqlite::types::Type;

pub fn ty_to_arrow(ty: Type) -> Option<DataType> {
    match ty {
        Type::Integer => Some(DataType::Int64),
        Type::Real => Some(DataType::Float64),
        Type::Text => Some(DataType::LargeUtf8),
        Type::Blob => Some(DataType::LargeBinary),
        Type::Null => None,
    }
}

/// Combine the types of two values stored in the same column.
///
/// SQLite does not enforce column types, so one column can hold values of any storage class.
pub fn widen(current: Option<DataType>, next: Option<DataType>) -> Option<DataType> {
    match (current, next) {
        (None, t) | (t, None) => t,
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(DataType::Int64), Some(DataType::Float64))
        | (Some(DataType::Float64), Some(DataType::Int64)) => Some(DataType::Float64),
        (Some(DataType::LargeBinary), Some(_)) | (Some(_), Some(DataType::LargeBinary)) => {
            Some(DataType::LargeBinary)
        }
        _ => Some(DataType::LargeUtf8),
    }
}

/// Type of a column without any non-null values, derived from its declared type.
pub fn decl_ty_to_arrow(decl_ty: &str) -> Option<DataType> {
    // SQLite does not have a "required" column type, only "suggest" column type,
    // known a column type affinity.
    // See: https://sqlite.org/datatype3.html#determination_of_column_affinity
    let ty = decl_ty.to_ascii_uppercase();
    if ty.contains("INT") {
        return Some(DataType::Int64);
    }

    if ty.contains("CHAR") || ty.contains("CLOB") || ty.contains("TEXT") {
        return Some(DataType::LargeUtf8);
    }

    if ty.contains("BLOB") {
        return Some(DataType::LargeBinary);
    }

    if ty.contains("REAL") || ty.contains("FLOA") || ty.contains("DOUB") {
        return Some(DataType::Float64);
    }

    None
}
