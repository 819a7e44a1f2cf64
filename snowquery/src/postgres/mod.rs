//! Provides `snowquery` traits for [postgres crate](https://docs.rs/postgres),
//! used for both PostgreSQL and Amazon Redshift.
//!
//! ```no_run
//! use snowquery::api::Connector;
//! use snowquery::postgres::{PostgresConnection, ProtocolExtended};
//!
//! let client = postgres::Client::connect("postgres://localhost:5432/my_db", postgres::NoTls).unwrap();
//!
//! let mut conn = PostgresConnection::<ProtocolExtended>::new(client);
//!
//! let reader = conn.query("SELECT * FROM my_table").unwrap();
//! ```

mod protocol_extended;
mod protocol_simple;
mod types;

use std::marker::PhantomData;
use std::time::Duration;

use postgres::config::SslMode as PgSslMode;
use postgres::Client;
use thiserror::Error;

use crate::config::{PostgresParams, SslMode};
use crate::errors::ConnectorError;

pub use protocol_extended::PostgresBatchStream;

/// Connection to PostgreSQL or Redshift that implements [crate::api::Connector].
///
/// Requires generic argument `Protocol`, which can be one of the following types:
/// - [ProtocolExtended]
/// - [ProtocolSimple]
pub struct PostgresConnection<Protocol> {
    client: Client,
    _protocol: PhantomData<Protocol>,
}

impl<Protocol> PostgresConnection<Protocol> {
    pub fn new(client: Client) -> Self {
        PostgresConnection {
            client,
            _protocol: PhantomData,
        }
    }

    pub fn unwrap(self) -> Client {
        self.client
    }

    /// Terminate the session. Dropping the connection does the same, but ignores errors.
    pub fn close(self) -> Result<(), ConnectorError> {
        self.client.close().map_err(PostgresError::from)?;
        Ok(())
    }
}

/// Extended PostgreSQL wire protocol.
/// Values are transferred in their binary encodings.
/// Supports streaming, with batch size of 1024.
pub struct ProtocolExtended;

/// Simple PostgreSQL wire protocol, used for Redshift.
/// This protocol returns the values in rows as strings rather than in their binary encodings.
/// Does not support streaming.
pub struct ProtocolSimple;

#[derive(Error, Debug)]
pub enum PostgresError {
    #[error(transparent)]
    Postgres(#[from] postgres::Error),

    #[error(transparent)]
    Tls(#[from] native_tls::Error),

    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
}

/// A zero `timeout` waits as long as the operating system allows, like libpq.
fn client_config(params: &PostgresParams, timeout: Duration) -> postgres::Config {
    let mut config = postgres::Config::new();
    config
        .host(&params.host)
        .port(params.port)
        .user(&params.username)
        .password(&params.password)
        .dbname(&params.database)
        .application_name("snowquery");
    if !timeout.is_zero() {
        config.connect_timeout(timeout);
    }
    config
}

/// Open a session with the server described by `params`.
pub fn connect(params: &PostgresParams, timeout: Duration) -> Result<Client, ConnectorError> {
    log::debug!("connecting to {params:?}");

    let mut config = client_config(params, timeout);

    let sslmode = params.sslmode.unwrap_or(SslMode::Prefer);
    let client = match sslmode {
        SslMode::Disable => {
            config.ssl_mode(PgSslMode::Disable);
            config.connect(postgres::NoTls)
        }
        _ => {
            config.ssl_mode(match sslmode {
                SslMode::Allow | SslMode::Prefer => PgSslMode::Prefer,
                _ => PgSslMode::Require,
            });

            // like libpq, only the verify-* modes check the server certificate
            let verify_ca = matches!(sslmode, SslMode::VerifyCa | SslMode::VerifyFull);
            let verify_host = matches!(sslmode, SslMode::VerifyFull);
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(!verify_ca)
                .danger_accept_invalid_hostnames(!verify_host)
                .build()
                .map_err(PostgresError::from)?;
            config.connect(postgres_native_tls::MakeTlsConnector::new(tls))
        }
    };
    Ok(client.map_err(PostgresError::from)?)
}
