//! Query Snowflake, PostgreSQL, Redshift, SQLite and DuckDB through one function,
//! and optionally cache the results into a local DuckDB file.
//!
//! Connections are named. Their parameters are read from a YAML credential file
//! (`~/snowquery_creds.yaml`) and can be overridden per call. Results are
//! returned as Apache Arrow record batches.
//!
//! ```no_run
//! use snowquery::{query_db, QueryArgs, QueryOutput};
//!
//! # fn main() -> Result<(), snowquery::Error> {
//! let args = QueryArgs {
//!     conn_name: "warehouse_pg".into(),
//!     ..QueryArgs::default()
//! };
//! if let QueryOutput::Table(table) = query_db("SELECT * FROM orders", &args)? {
//!     println!("{table}");
//! }
//!
//! // stream the same result into ./analytics.duckdb
//! let args = QueryArgs {
//!     cache_table_name: Some("orders".into()),
//!     ..args
//! };
//! println!("{}", query_db("SELECT * FROM orders", &args)?);
//! # Ok(())
//! # }
//! ```
//!
//! The lower layers are usable on their own: each driver implements
//! [api::Connector], which [query] reads into a [Table].
//!
//! ## Transitive dependency on arrow
//!
//! Use the re-export `snowquery::arrow` rather than depending on `arrow` directly,
//! unless you make sure to use exactly the same version.

pub mod api;
pub mod cache;
pub mod config;
pub mod connection;
pub mod duckdb;
mod errors;
pub mod postgres;
pub mod snowflake;
pub mod sqlite;
mod table;
pub mod util;

pub use arrow;
pub use errors::*;
pub use table::Table;

use std::fmt;
use std::time::Duration;

use self::api::Connector;
use self::cache::CacheReport;
use self::config::{BackendKind, ConnParams, ResolvedConnection, Settings};
use self::connection::Connection;
use self::postgres::{PostgresConnection, ProtocolExtended, ProtocolSimple};
use self::snowflake::bootstrap::{Bootstrap, PipPackageManager, Readiness};
use self::snowflake::{PythonBridge, SnowflakeDriver};

/// Execute a single query on an open connection and read the whole result.
pub fn query<C: Connector>(conn: &mut C, query: &str) -> Result<Table, ConnectorError> {
    log::debug!("query: {query}");

    let reader = conn.query(query)?;
    Table::from_reader(reader)
}

/// Arguments of [Snowquery::query_db].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryArgs {
    /// Name of the connection in the credential file.
    pub conn_name: String,

    /// Backend kind, overriding the `db_type` of the stored connection.
    pub db_type: Option<String>,

    /// Connection parameters, overriding the stored ones.
    pub params: ConnParams,

    /// Connect (or login) timeout.
    pub timeout: Duration,

    /// When set, the result is written to this table of the cache store instead of being returned.
    pub cache_table_name: Option<String>,

    /// Replace the cache table instead of appending to it.
    pub overwrite: bool,
}

impl Default for QueryArgs {
    fn default() -> Self {
        QueryArgs {
            conn_name: "default".to_string(),
            db_type: None,
            params: ConnParams::default(),
            timeout: Duration::from_secs(15),
            cache_table_name: None,
            overwrite: true,
        }
    }
}

/// Result of [Snowquery::query_db]: either the rows, or where they were cached.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Table(Table),
    Cached(CacheReport),
}

impl QueryOutput {
    pub fn into_table(self) -> Option<Table> {
        match self {
            QueryOutput::Table(table) => Some(table),
            QueryOutput::Cached(_) => None,
        }
    }
}

impl fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutput::Table(table) => fmt::Display::fmt(table, f),
            QueryOutput::Cached(report) => fmt::Display::fmt(report, f),
        }
    }
}

/// Entry point: resolves named connections, runs queries and caches results.
pub struct Snowquery<D = PythonBridge> {
    settings: Settings,
    snowflake: D,
}

impl Snowquery<PythonBridge> {
    pub fn new(settings: Settings) -> Self {
        Snowquery {
            settings,
            snowflake: PythonBridge::new(),
        }
    }
}

impl Default for Snowquery<PythonBridge> {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl<D: SnowflakeDriver> Snowquery<D> {
    pub fn with_driver(settings: Settings, snowflake: D) -> Self {
        Snowquery {
            settings,
            snowflake,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Determine the backend and the parameters of the connection.
    ///
    /// The credential file is read on every call.
    pub fn resolve(&self, args: &QueryArgs) -> Result<ResolvedConnection, Error> {
        let store = self.settings.load_credentials()?;
        Ok(config::resolve(
            &args.conn_name,
            args.db_type.as_deref(),
            &args.params,
            &store,
        )?)
    }

    /// Run `sql` on the connection named in `args`.
    ///
    /// Without `cache_table_name` the result is returned as a [Table]. With it, the
    /// result is written into that table of the cache store and only the report is
    /// returned. Sources that can be cached are Snowflake, PostgreSQL and Redshift.
    pub fn query_db(&self, sql: &str, args: &QueryArgs) -> Result<QueryOutput, Error> {
        let store = self.settings.load_credentials()?;

        if let Some(dest) = &args.cache_table_name {
            // fail before connecting anywhere
            let kind = config::resolve_backend(&args.conn_name, args.db_type.as_deref(), &store)?;
            cache::check_source(kind)?;
            cache::validate_table_name(dest)?;
        }

        let resolved = config::resolve(
            &args.conn_name,
            args.db_type.as_deref(),
            &args.params,
            &store,
        )?;

        match &args.cache_table_name {
            None => self.fetch(sql, args, &resolved).map(QueryOutput::Table),
            Some(dest) => self.cache(sql, args, &resolved, dest).map(QueryOutput::Cached),
        }
    }

    fn fetch(
        &self,
        sql: &str,
        args: &QueryArgs,
        resolved: &ResolvedConnection,
    ) -> Result<Table, Error> {
        let kind = resolved.kind();
        let mut conn = Connection::open(resolved, &self.settings, args.timeout, &self.snowflake)
            .map_err(|e| self.connect_error(kind, args, e))?;

        let table = conn.execute(sql).map_err(|e| query_error(kind, args, e))?;
        conn.close().map_err(|e| query_error(kind, args, e))?;

        log::debug!("{} rows fetched from '{}'", table.num_rows(), args.conn_name);
        Ok(table)
    }

    fn cache(
        &self,
        sql: &str,
        args: &QueryArgs,
        resolved: &ResolvedConnection,
        dest: &str,
    ) -> Result<CacheReport, Error> {
        let kind = resolved.kind();
        let open_store = || {
            crate::duckdb::open(&self.settings.cache_path).map_err(|source| CacheError::Driver {
                table: dest.to_string(),
                stage: "opening the cache store",
                source,
            })
        };
        let connect_error = |e| self.connect_error(kind, args, e);

        let report = match resolved {
            ResolvedConnection::Snowflake(params) => {
                let mut conn = self
                    .snowflake
                    .connect(params, args.timeout)
                    .map_err(connect_error)?;
                let store = open_store()?;

                let report = {
                    let mut cursor = conn.cursor().map_err(|e| query_error(kind, args, e))?;
                    let report =
                        cache::stream_batches(cursor.as_mut(), sql, &store, dest, args.overwrite)?;
                    cursor.close().map_err(|e| query_error(kind, args, e))?;
                    report
                };
                conn.close().map_err(|e| query_error(kind, args, e))?;
                report
            }
            ResolvedConnection::Postgres(params) => {
                let client = crate::postgres::connect(params, args.timeout).map_err(connect_error)?;
                let mut source = PostgresConnection::<ProtocolExtended>::new(client);
                let mut store = open_store()?;

                let reader = source.query(sql).map_err(|e| query_error(kind, args, e))?;
                let report = cache::materialize(reader, &mut store, dest, args.overwrite)?;
                source.close().map_err(|e| query_error(kind, args, e))?;
                report
            }
            ResolvedConnection::Redshift(params) => {
                let client = crate::postgres::connect(params, args.timeout).map_err(connect_error)?;
                let mut source = PostgresConnection::<ProtocolSimple>::new(client);
                let mut store = open_store()?;

                let reader = source.query(sql).map_err(|e| query_error(kind, args, e))?;
                let report = cache::materialize(reader, &mut store, dest, args.overwrite)?;
                source.close().map_err(|e| query_error(kind, args, e))?;
                report
            }
            ResolvedConnection::SQLite(_) => {
                return Err(CacheError::UnsupportedSource(BackendKind::SQLite).into())
            }
            ResolvedConnection::DuckDB => return Err(CacheError::SelfCache.into()),
        };
        Ok(report)
    }

    fn connect_error(
        &self,
        backend: BackendKind,
        args: &QueryArgs,
        source: ConnectorError,
    ) -> Error {
        let hint = match &source {
            ConnectorError::Bridge(e) if e.is_missing_connector() => format!(
                "Install it with `pip install \"snowflake-connector-python[pandas]>={}\"`.",
                snowflake::bootstrap::MIN_CONNECTOR_VERSION
            ),
            _ => self.settings.credential_hint(&args.conn_name),
        };
        Error::Connect {
            backend,
            conn_name: args.conn_name.clone(),
            hint,
            source,
        }
    }

    /// Install or upgrade the Python Snowflake connector with `pip`, if needed.
    ///
    /// Call it once, before querying Snowflake through the default [PythonBridge].
    pub fn ensure_snowflake_ready(&self) -> Result<Readiness, Error> {
        let manager = PipPackageManager::discover()
            .map_err(|e| BootstrapError::Install(e.to_string()))?;
        Ok(Bootstrap::new(manager).ensure_ready()?)
    }
}

fn query_error(backend: BackendKind, args: &QueryArgs, source: ConnectorError) -> Error {
    Error::Query {
        backend,
        conn_name: args.conn_name.clone(),
        source,
    }
}

/// [Snowquery::query_db] with the default [Settings] and the default Snowflake driver.
pub fn query_db(sql: &str, args: &QueryArgs) -> Result<QueryOutput, Error> {
    Snowquery::default().query_db(sql, args)
}
