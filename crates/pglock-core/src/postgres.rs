//! PostgreSQL lock session over tokio-postgres
//!
//! One `PgSession` is one backend connection, and so one owner of advisory
//! locks. Dropping or closing it ends the backend session and releases every
//! lock taken through it.

use std::future::Future;

use async_trait::async_trait;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio::task::JoinHandle;
use tokio_postgres::{types::ToSql, types::Type, Client, NoTls};
use tracing::{debug, warn};

use crate::{
    config::{Config, SslMode},
    lock::LockSession,
    Error, Result,
};

const TRY_LOCK_SQL: &str = "SELECT pg_try_advisory_lock($1)";
const LOCK_SQL: &str = "SELECT pg_advisory_lock($1)";

/// A connected backend session able to hold advisory locks.
pub struct PgSession {
    client: Client,
    tls: Option<MakeTlsConnector>,
    driver: JoinHandle<()>,
}

impl std::fmt::Debug for PgSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSession")
            .field("tls", &self.tls.is_some())
            .field("closed", &self.client.is_closed())
            .finish_non_exhaustive()
    }
}

impl PgSession {
    /// Open a session with the connection parameters and SSL mode from `config`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the TLS connector cannot be built or the
    /// server cannot be reached or rejects the login.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pg_config = config.pg_config();
        let tls = build_tls_connector(config.ssl_mode)?;

        let (client, driver) = match &tls {
            None => {
                debug!("connecting to PostgreSQL without TLS");
                let (client, connection) = pg_config
                    .connect(NoTls)
                    .await
                    .map_err(|e| Error::connection(describe(&e)))?;
                (client, spawn_driver(connection))
            }
            Some(connector) => {
                debug!(ssl_mode = %config.ssl_mode, "connecting to PostgreSQL with TLS");
                let (client, connection) = pg_config
                    .connect(connector.clone())
                    .await
                    .map_err(|e| Error::connection(describe(&e)))?;
                (client, spawn_driver(connection))
            }
        };

        Ok(Self {
            client,
            tls,
            driver,
        })
    }

    /// End the backend session and wait for the connection to shut down.
    ///
    /// The server releases all session-level advisory locks when this returns.
    pub async fn close(self) {
        let Self { client, driver, .. } = self;
        drop(client);
        if let Err(e) = driver.await {
            warn!(error = %e, "PostgreSQL connection task did not shut down cleanly");
        }
    }
}

#[async_trait]
impl LockSession for PgSession {
    async fn try_advisory_lock(&self, key: i64) -> Result<bool> {
        let params: [(&(dyn ToSql + Sync), Type); 1] = [(&key, Type::INT8)];
        let rows = self
            .client
            .query_typed(TRY_LOCK_SQL, &params)
            .await
            .map_err(|e| query_error(&e))?;

        rows.first()
            .ok_or_else(|| Error::lock_query(None, "pg_try_advisory_lock returned no rows"))?
            .try_get::<_, bool>(0)
            .map_err(|e| query_error(&e))
    }

    async fn advisory_lock(&self, key: i64) -> Result<()> {
        let params: [(&(dyn ToSql + Sync), Type); 1] = [(&key, Type::INT8)];
        self.client
            .query_typed(LOCK_SQL, &params)
            .await
            .map(drop)
            .map_err(|e| query_error(&e))
    }

    async fn cancel_in_flight(&self) -> Result<()> {
        let token = self.client.cancel_token();
        let cancelled = match &self.tls {
            None => token.cancel_query(NoTls).await,
            Some(connector) => token.cancel_query(connector.clone()).await,
        };
        cancelled.map_err(|e| Error::connection(format!("failed to cancel lock query: {}", describe(&e))))
    }
}

fn spawn_driver<F>(connection: F) -> JoinHandle<()>
where
    F: Future<Output = std::result::Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!(error = %e, "PostgreSQL connection error");
        }
    })
}

fn build_tls_connector(mode: SslMode) -> Result<Option<MakeTlsConnector>> {
    let mut builder = TlsConnector::builder();
    match mode {
        SslMode::Disable => return Ok(None),
        SslMode::Prefer | SslMode::Require => {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyFull => {}
    }

    builder
        .build()
        .map(|connector| Some(MakeTlsConnector::new(connector)))
        .map_err(|e| {
            Error::connection(format!(
                "failed to build TLS connector for sslmode={mode}: {e}"
            ))
        })
}

/// Classify a failed lock query. Anything the server answered with a SQLSTATE
/// is a lock query error; losing the session is a connection error.
fn query_error(err: &tokio_postgres::Error) -> Error {
    match err.code() {
        Some(state) => Error::lock_query(Some(state.code().to_string()), describe(err)),
        None if err.is_closed() => Error::connection(describe(err)),
        None => Error::lock_query(None, describe(err)),
    }
}

fn describe(err: &tokio_postgres::Error) -> String {
    err.as_db_error().map_or_else(
        || {
            std::error::Error::source(err)
                .map_or_else(|| err.to_string(), |source| format!("{err}: {source}"))
        },
        |db| format!("{}: {} (SQLSTATE {})", db.severity(), db.message(), db.code().code()),
    )
}
