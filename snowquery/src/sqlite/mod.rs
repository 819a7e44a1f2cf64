//! Provides `snowquery` traits for [rusqlite crate](https://docs.rs/rusqlite).

mod query;
mod types;

use std::path::Path;

use crate::errors::ConnectorError;

/// Open (and create, if needed) the database file at `path`.
pub fn open(path: &Path) -> Result<rusqlite::Connection, ConnectorError> {
    log::debug!("opening sqlite database {}", path.display());

    rusqlite::Connection::open(path).map_err(|e| ConnectorError::FileOpen {
        path: path.to_path_buf(),
        source: Box::new(e.into()),
    })
}
