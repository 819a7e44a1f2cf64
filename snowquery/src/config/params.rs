use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::ConfigError;

use super::credentials::{CredentialStore, StoredConnection};

/// Database backends a named connection can point to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Snowflake,
    Postgres,
    Redshift,
    SQLite,
    DuckDB,
}

impl BackendKind {
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Snowflake,
        BackendKind::Redshift,
        BackendKind::Postgres,
        BackendKind::SQLite,
        BackendKind::DuckDB,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Snowflake => "snowflake",
            BackendKind::Postgres => "postgres",
            BackendKind::Redshift => "redshift",
            BackendKind::SQLite => "sqlite",
            BackendKind::DuckDB => "duckdb",
        }
    }

    /// Parameters that must resolve to a value before a connection can be opened.
    pub fn required_params(&self) -> &'static [Param] {
        use Param::*;
        match self {
            BackendKind::Snowflake => &[Username, Password, Account, Database, Warehouse, Role],
            BackendKind::Postgres | BackendKind::Redshift => {
                &[Username, Password, Host, Database, Port]
            }
            BackendKind::SQLite => &[Database],
            BackendKind::DuckDB => &[],
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnsupportedBackend(s.to_string()))
    }
}

/// Connection parameters recognized in the credential file and as explicit arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Username,
    Password,
    Host,
    Port,
    Database,
    Warehouse,
    Account,
    Role,
    SslMode,
}

impl Param {
    pub fn as_str(&self) -> &'static str {
        match self {
            Param::Username => "username",
            Param::Password => "password",
            Param::Host => "host",
            Param::Port => "port",
            Param::Database => "database",
            Param::Warehouse => "warehouse",
            Param::Account => "account",
            Param::Role => "role",
            Param::SslMode => "sslmode",
        }
    }
}

/// Connection parameters passed at call time. Every field overrides the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnParams {
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub database: Option<String>,
    pub warehouse: Option<String>,
    pub account: Option<String>,
    pub role: Option<String>,
    pub sslmode: Option<String>,
}

impl ConnParams {
    pub fn get(&self, param: Param) -> Option<&str> {
        let value = match param {
            Param::Username => &self.username,
            Param::Password => &self.password,
            Param::Host => &self.host,
            Param::Port => &self.port,
            Param::Database => &self.database,
            Param::Warehouse => &self.warehouse,
            Param::Account => &self.account,
            Param::Role => &self.role,
            Param::SslMode => &self.sslmode,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }
}

/// TLS negotiation for Postgres and Redshift, named like libpq's `sslmode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl FromStr for SslMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "disable" => SslMode::Disable,
            "allow" => SslMode::Allow,
            "prefer" => SslMode::Prefer,
            "require" => SslMode::Require,
            "verify-ca" => SslMode::VerifyCa,
            "verify-full" => SslMode::VerifyFull,
            _ => {
                return Err(ConfigError::InvalidParameter {
                    field: Param::SslMode.as_str(),
                    value: s.to_string(),
                    reason: "expected one of disable, allow, prefer, require, verify-ca, verify-full",
                })
            }
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SnowflakeParams {
    pub username: String,
    pub password: String,
    pub account: String,
    pub database: String,
    pub warehouse: String,
    pub role: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PostgresParams {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub sslmode: Option<SslMode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SQLiteParams {
    pub path: PathBuf,
}

// passwords stay out of logs and error messages

impl fmt::Debug for SnowflakeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeParams")
            .field("username", &self.username)
            .field("account", &self.account)
            .field("database", &self.database)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for PostgresParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresParams")
            .field("username", &self.username)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("sslmode", &self.sslmode)
            .finish_non_exhaustive()
    }
}

/// A named connection with the backend determined and all required parameters present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedConnection {
    Snowflake(SnowflakeParams),
    Postgres(PostgresParams),
    Redshift(PostgresParams),
    SQLite(SQLiteParams),
    DuckDB,
}

impl ResolvedConnection {
    pub fn kind(&self) -> BackendKind {
        match self {
            ResolvedConnection::Snowflake(_) => BackendKind::Snowflake,
            ResolvedConnection::Postgres(_) => BackendKind::Postgres,
            ResolvedConnection::Redshift(_) => BackendKind::Redshift,
            ResolvedConnection::SQLite(_) => BackendKind::SQLite,
            ResolvedConnection::DuckDB => BackendKind::DuckDB,
        }
    }
}

/// Determines the backend of a connection.
///
/// An explicit, non-empty `db_type` wins over the one stored for `conn_name`.
pub fn resolve_backend(
    conn_name: &str,
    explicit_db_type: Option<&str>,
    store: &CredentialStore,
) -> Result<BackendKind, ConfigError> {
    let db_type = explicit_db_type
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| store.get(conn_name).and_then(|c| c.get("db_type")));

    match db_type {
        Some(db_type) => db_type.parse(),
        None => Err(ConfigError::DbTypeMissing {
            conn_name: conn_name.to_string(),
        }),
    }
}

/// Merges explicit parameters over the stored ones and checks that the backend's
/// required parameters are all present.
pub fn resolve(
    conn_name: &str,
    explicit_db_type: Option<&str>,
    explicit: &ConnParams,
    store: &CredentialStore,
) -> Result<ResolvedConnection, ConfigError> {
    let kind = resolve_backend(conn_name, explicit_db_type, store)?;

    let empty = StoredConnection::default();
    let stored = store.get(conn_name).unwrap_or(&empty);
    let merged = Merged { explicit, stored };

    let missing: Vec<&'static str> = kind
        .required_params()
        .iter()
        .filter(|p| merged.get(**p).is_none())
        .map(Param::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingCredentials {
            backend: kind,
            conn_name: conn_name.to_string(),
            fields: missing,
        });
    }

    log::debug!("connection '{conn_name}' resolved to backend {kind}");

    Ok(match kind {
        BackendKind::Snowflake => ResolvedConnection::Snowflake(SnowflakeParams {
            username: merged.require(Param::Username),
            password: merged.require(Param::Password),
            account: merged.require(Param::Account),
            database: merged.require(Param::Database),
            warehouse: merged.require(Param::Warehouse),
            role: merged.require(Param::Role),
        }),
        BackendKind::Postgres => ResolvedConnection::Postgres(merged.postgres()?),
        BackendKind::Redshift => ResolvedConnection::Redshift(merged.postgres()?),
        BackendKind::SQLite => ResolvedConnection::SQLite(SQLiteParams {
            path: PathBuf::from(merged.require(Param::Database)),
        }),
        BackendKind::DuckDB => ResolvedConnection::DuckDB,
    })
}

struct Merged<'a> {
    explicit: &'a ConnParams,
    stored: &'a StoredConnection,
}

impl Merged<'_> {
    fn get(&self, param: Param) -> Option<String> {
        match self.explicit.get(param) {
            Some(value) => Some(value.to_string()),
            None => self.stored.get(param.as_str()),
        }
    }

    /// Only called for parameters already checked to be present.
    fn require(&self, param: Param) -> String {
        self.get(param).unwrap_or_default()
    }

    fn postgres(&self) -> Result<PostgresParams, ConfigError> {
        let port = self.require(Param::Port);
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidParameter {
                field: Param::Port.as_str(),
                value: port.clone(),
                reason: "expected a port number between 0 and 65535",
            })?;

        let sslmode = self.get(Param::SslMode).map(|m| m.parse()).transpose()?;

        Ok(PostgresParams {
            username: self.require(Param::Username),
            password: self.require(Param::Password),
            host: self.require(Param::Host),
            port,
            database: self.require(Param::Database),
            sslmode,
        })
    }
}
