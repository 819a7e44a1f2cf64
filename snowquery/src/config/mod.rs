//! Resolution of named connections: the credential file, explicit overrides and
//! the fixed file locations used by [crate::Snowquery].

mod credentials;
mod params;

use std::path::PathBuf;

pub use credentials::{
    default_credentials_path, CredentialStore, Scalar, StoredConnection, CREDENTIALS_FILE_NAME,
};
pub use params::{
    resolve, resolve_backend, BackendKind, ConnParams, Param, PostgresParams, ResolvedConnection,
    SQLiteParams, SnowflakeParams, SslMode,
};

use crate::errors::ConfigError;

/// File name of the local DuckDB store, relative to the working directory.
pub const CACHE_FILE_NAME: &str = "analytics.duckdb";

/// Locations of the files [crate::Snowquery] reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// YAML credential file. `None` means that only explicit parameters are used.
    pub credentials_path: Option<PathBuf>,

    /// DuckDB file that backs the `duckdb` backend and receives cached tables.
    pub cache_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            credentials_path: Some(default_credentials_path()),
            cache_path: PathBuf::from(CACHE_FILE_NAME),
        }
    }
}

impl Settings {
    /// Loads the credential store. It is read again on every call, never cached.
    pub fn load_credentials(&self) -> Result<CredentialStore, ConfigError> {
        match &self.credentials_path {
            Some(path) => CredentialStore::load(path),
            None => Ok(CredentialStore::default()),
        }
    }

    /// Hint appended to connection errors.
    pub(crate) fn credential_hint(&self, conn_name: &str) -> String {
        match &self.credentials_path {
            Some(path) => format!(
                "Check the credentials of '{conn_name}' in {} or pass them explicitly.",
                path.display()
            ),
            None => "Check the explicitly passed credentials.".to_string(),
        }
    }
}
