//! Snowflake access through a driver capability interface.
//!
//! The default driver is [PythonBridge], which runs `snowflake-connector-python`
//! in a child process and receives results in Arrow IPC stream format.
//! Tests and embedders can plug in their own [SnowflakeDriver].

pub mod bootstrap;
mod bridge;
mod python;
mod types;

use std::time::Duration;

use thiserror::Error;

use crate::api::ResultReader;
use crate::config::SnowflakeParams;
use crate::errors::ConnectorError;
use crate::table::Table;

pub use bridge::PythonBridge;
pub use python::find_python;
pub use types::{description_to_schema, ColumnDescription};

/// Opens Snowflake sessions.
pub trait SnowflakeDriver {
    fn connect(
        &self,
        params: &SnowflakeParams,
        login_timeout: Duration,
    ) -> Result<Box<dyn SnowflakeConnection>, ConnectorError>;
}

/// An open Snowflake session.
pub trait SnowflakeConnection {
    fn cursor(&mut self) -> Result<Box<dyn SnowflakeCursor + '_>, ConnectorError>;

    /// End the session. Dropping the connection must release it too.
    fn close(self: Box<Self>) -> Result<(), ConnectorError>;
}

pub trait SnowflakeCursor {
    fn execute(&mut self, sql: &str) -> Result<(), ConnectorError>;

    /// Read the whole result of the last executed statement.
    fn fetch_all(&mut self) -> Result<Table, ConnectorError>;

    /// Stream the result of the last executed statement batch by batch.
    ///
    /// Returns `None` when the driver cannot fetch batches, in which case
    /// [SnowflakeCursor::fetch_all] has to be used instead.
    fn batches(&mut self) -> Option<Result<Box<dyn ResultReader + '_>, ConnectorError>>;

    fn close(self: Box<Self>) -> Result<(), ConnectorError>;
}

/// Failures of the Python bridge process.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("no Python interpreter found (tried $SNOWQUERY_PYTHON, python3, python): {0}")]
    PythonNotFound(#[from] which::Error),

    #[error("cannot communicate with the Python bridge: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message from the Python bridge: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Python bridge protocol violation: {0}")]
    Protocol(String),

    #[error("{message}")]
    Remote { kind: String, message: String },
}

impl BridgeError {
    /// True when the bridge could not import `snowflake.connector`.
    pub fn is_missing_connector(&self) -> bool {
        matches!(self, BridgeError::Remote { kind, .. } if kind == "import")
    }
}
