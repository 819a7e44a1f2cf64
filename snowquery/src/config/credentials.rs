//! Named connections read from the YAML credential file.
//!
//! ```yaml
//! default:
//!   db_type: snowflake
//!   account: xy12345.eu-west-1
//!   username: analyst
//!   password: hunter2
//!   database: ANALYTICS
//!   warehouse: COMPUTE_WH
//!   role: ANALYST
//! warehouse_pg:
//!   db_type: postgres
//!   host: localhost
//!   port: 5432
//!   database: shop
//!   username: shop
//!   password: shop
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::ConfigError;

/// File name of the credential file inside the home directory.
pub const CREDENTIALS_FILE_NAME: &str = "snowquery_creds.yaml";

/// `~/snowquery_creds.yaml`, or a relative `snowquery_creds.yaml` when there is no home directory.
pub fn default_credentials_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(CREDENTIALS_FILE_NAME),
        None => PathBuf::from(CREDENTIALS_FILE_NAME),
    }
}

/// A scalar value of a stored connection parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Text(v) => f.write_str(v),
            Scalar::Integer(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Parameters of one named connection, exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct StoredConnection {
    values: BTreeMap<String, Option<Scalar>>,
}

impl StoredConnection {
    /// Value of a parameter rendered as a string. Null and empty values count as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = self.values.get(key)?.as_ref()?.to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StoredConnection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| (k.into(), Some(Scalar::Text(v.into()))))
            .collect();
        StoredConnection { values }
    }
}

/// Mapping from connection name to its stored parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CredentialStore {
    connections: BTreeMap<String, StoredConnection>,
}

impl CredentialStore {
    /// Reads and parses the credential file.
    ///
    /// Errors of the file system and of the YAML parser are returned unchanged.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::debug!("reading credentials from {}", path.display());

        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        // an empty document is a valid, empty store
        if contents.trim().is_empty() {
            return Ok(CredentialStore::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn get(&self, conn_name: &str) -> Option<&StoredConnection> {
        self.connections.get(conn_name)
    }

    pub fn insert(&mut self, conn_name: impl Into<String>, conn: StoredConnection) {
        self.connections.insert(conn_name.into(), conn);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }
}
