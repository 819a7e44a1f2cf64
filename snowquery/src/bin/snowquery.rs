//! snowquery - run SQL against a named connection and print or cache the result

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use snowquery::config::{BackendKind, ConnParams, Settings};
use snowquery::{QueryArgs, Snowquery};

#[derive(Parser, Debug)]
#[command(name = "snowquery", version)]
#[command(about = "Query Snowflake, PostgreSQL, Redshift, SQLite or DuckDB by connection name", long_about = None)]
struct Args {
    /// SQL to execute
    sql: String,

    /// Connection name in the credential file
    #[arg(short, long, default_value = "default")]
    conn: String,

    /// Backend kind, overriding the stored `db_type`
    #[arg(long, value_name = "KIND")]
    db_type: Option<String>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long, env = "SNOWQUERY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<String>,

    /// Database name, or file path for sqlite
    #[arg(long)]
    database: Option<String>,

    #[arg(long)]
    warehouse: Option<String>,

    #[arg(long)]
    account: Option<String>,

    #[arg(long)]
    role: Option<String>,

    /// TLS mode for postgres and redshift (disable, allow, prefer, require, verify-ca, verify-full)
    #[arg(long)]
    sslmode: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,

    /// Write the result into this table of the cache database instead of printing it
    #[arg(long, value_name = "TABLE")]
    cache_table: Option<String>,

    /// Append to the cache table instead of replacing it
    #[arg(long, requires = "cache_table")]
    append: bool,

    /// Credential file [default: ~/snowquery_creds.yaml]
    #[arg(long, value_name = "FILE")]
    credentials: Option<PathBuf>,

    /// Cache database file
    #[arg(long, value_name = "FILE", default_value = snowquery::config::CACHE_FILE_NAME)]
    cache_db: PathBuf,

    /// Do not install or upgrade the Python Snowflake connector
    #[arg(long)]
    skip_bootstrap: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let settings = Settings {
        credentials_path: Some(
            args.credentials
                .clone()
                .unwrap_or_else(snowquery::config::default_credentials_path),
        ),
        cache_path: args.cache_db.clone(),
    };
    let snowquery = Snowquery::new(settings);

    let query_args = QueryArgs {
        conn_name: args.conn,
        db_type: args.db_type,
        params: ConnParams {
            username: args.username,
            password: args.password,
            host: args.host,
            port: args.port,
            database: args.database,
            warehouse: args.warehouse,
            account: args.account,
            role: args.role,
            sslmode: args.sslmode,
        },
        timeout: Duration::from_secs(args.timeout),
        cache_table_name: args.cache_table,
        overwrite: !args.append,
    };

    if !args.skip_bootstrap {
        let resolved = snowquery.resolve(&query_args)?;
        if resolved.kind() == BackendKind::Snowflake {
            let readiness = snowquery
                .ensure_snowflake_ready()
                .context("Failed to prepare the Snowflake connector")?;
            log::info!("snowflake connector ready: {readiness:?}");
        }
    }

    let output = snowquery.query_db(&args.sql, &query_args)?;
    println!("{output}");

    Ok(())
}
