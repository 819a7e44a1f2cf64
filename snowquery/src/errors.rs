use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

use crate::config::BackendKind;

/// Errors that can be raised from [crate::Snowquery::query_db].
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot connect to {backend} connection '{conn_name}': {source}\n{hint}")]
    Connect {
        backend: BackendKind,
        conn_name: String,
        hint: String,
        source: ConnectorError,
    },

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("Query against {backend} connection '{conn_name}' failed: {source}")]
    Query {
        backend: BackendKind,
        conn_name: String,
        source: ConnectorError,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors raised while resolving a named connection.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("db_type missing for connection '{conn_name}': set `db_type` in the credential file or pass it explicitly")]
    DbTypeMissing { conn_name: String },

    #[error("missing credentials for {backend} connection '{conn_name}': {}", .fields.iter().join(", "))]
    MissingCredentials {
        backend: BackendKind,
        conn_name: String,
        fields: Vec<&'static str>,
    },

    #[error("unsupported backend '{0}', supported backends are: snowflake, redshift, postgres, sqlite, duckdb")]
    UnsupportedBackend(String),

    #[error("invalid value '{value}' for parameter `{field}`: {reason}")]
    InvalidParameter {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Names of the required fields that could not be resolved.
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            ConfigError::MissingCredentials { fields, .. } => fields,
            _ => &[],
        }
    }
}

/// Failures of preparing the Python Snowflake connector.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("snowflake-connector-python is not installed and installing it failed: {0}\nInstall it manually with `pip install \"snowflake-connector-python[pandas]>={min}\"`", min = crate::snowflake::bootstrap::MIN_CONNECTOR_VERSION)]
    Install(String),

    #[error("cannot import snowflake.connector after installation: {0}")]
    Import(String),

    #[error("snowflake-connector-python {found} is older than {min} and upgrading it failed: {message}", min = crate::snowflake::bootstrap::MIN_CONNECTOR_VERSION)]
    Upgrade { found: String, message: String },
}

/// Errors raised when writing query results into the local cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cannot cache duckdb source to itself")]
    SelfCache,

    #[error("caching is not supported for {0} sources, only for snowflake, postgres and redshift")]
    UnsupportedSource(BackendKind),

    #[error("'{0}' is not a valid table name: use letters, digits and underscores, not starting with a digit")]
    InvalidTableName(String),

    #[error("caching into table '{table}' failed while {stage}: {source}")]
    Driver {
        table: String,
        stage: &'static str,
        source: ConnectorError,
    },
}

/// Errors of the underlying database drivers and of the conversion into Arrow.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Result data does not match the schema: {0}")]
    DataSchemaMismatch(String),

    #[error("Column '{column}' of type {db_type} cannot be converted to Arrow{}", .hint.as_ref().map(|h| format!(" ({h})")).unwrap_or_default())]
    IncompatibleSchema {
        column: String,
        db_type: String,
        hint: Option<String>,
    },

    #[error("Arrow type {0} cannot be stored in DuckDB")]
    UnsupportedArrowType(arrow::datatypes::DataType),

    #[error("Database file {path} cannot be opened: {source}")]
    FileOpen {
        path: PathBuf,
        source: Box<ConnectorError>,
    },

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    SQLite(#[from] rusqlite::Error),

    #[error(transparent)]
    DuckDB(#[from] duckdb::Error),

    #[error(transparent)]
    Postgres(#[from] crate::postgres::PostgresError),

    #[error(transparent)]
    Bridge(#[from] crate::snowflake::BridgeError),
}
