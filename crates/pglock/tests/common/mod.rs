//! Common helpers for pglock binary tests
//!
//! Database-backed tests read `PGLOCK_TEST_DATABASE_URL` and are skipped when
//! it is not set.

#![allow(dead_code)]

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use assert_cmd::Command;
use tempfile::TempDir;
use tokio_postgres::{config::Host, Client, NoTls};

pub const TEST_DATABASE_URL: &str = "PGLOCK_TEST_DATABASE_URL";

/// Every environment variable pglock reads, cleared so the developer's
/// shell cannot leak into a test.
const PGLOCK_ENV: &[&str] = &[
    "PGLOCK_USER",
    "PGLOCK_PASS",
    "PGLOCK_HOST",
    "PGLOCK_PORT",
    "PGLOCK_DATABASE",
    "PGLOCK_SSLMODE",
    "PGLOCK_LOCKID",
    "PGLOCK_WAIT",
];

/// The pglock binary with a clean `PGLOCK_*` environment.
pub fn pglock() -> Result<Command> {
    let mut cmd = Command::cargo_bin("pglock")?;
    for var in PGLOCK_ENV {
        cmd.env_remove(var);
    }
    cmd.env("RUST_LOG", "info").env("NO_COLOR", "1");
    Ok(cmd)
}

/// A scratch directory and a marker file path the guarded command can create.
pub struct Marker {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Marker {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp dir")?;
        let path = dir.path().join("ran");
        Ok(Self { _dir: dir, path })
    }

    pub fn touch_command(&self) -> Vec<String> {
        vec!["touch".to_string(), self.path.display().to_string()]
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Connection settings for the test database.
pub struct TestDatabase {
    url: String,
    user: String,
    password: Option<String>,
    host: String,
    port: u16,
    database: String,
}

impl TestDatabase {
    /// `None` when `PGLOCK_TEST_DATABASE_URL` is unset or unparsable.
    pub fn try_new() -> Option<Self> {
        let url = std::env::var(TEST_DATABASE_URL).ok()?;
        let pg: tokio_postgres::Config = url.parse().ok()?;
        let host = match pg.get_hosts().first()? {
            Host::Tcp(host) => host.clone(),
            #[cfg(unix)]
            Host::Unix(path) => path.to_string_lossy().into_owned(),
        };

        Some(Self {
            user: pg.get_user().unwrap_or("postgres").to_string(),
            password: pg
                .get_password()
                .map(|p| String::from_utf8_lossy(p).into_owned()),
            host,
            port: pg.get_ports().first().copied().unwrap_or(5432),
            database: pg.get_dbname().unwrap_or("postgres").to_string(),
            url,
        })
    }

    /// pglock invocation pointed at the test database.
    pub fn pglock(&self, lock_id: u32, wait_seconds: u32) -> Result<Command> {
        let mut cmd = pglock()?;
        cmd.args(["--user", self.user.as_str()])
            .args(["--host", self.host.as_str()])
            .args(["--port", self.port.to_string().as_str()])
            .args(["--database", self.database.as_str()])
            .args(["--lockid", lock_id.to_string().as_str()])
            .args(["--wait", wait_seconds.to_string().as_str()]);
        if let Some(password) = &self.password {
            cmd.env("PGLOCK_PASS", password);
        }
        Ok(cmd)
    }

    /// A separate session holding `lock_id` until it is dropped or released.
    pub async fn hold(&self, lock_id: u32) -> Result<Holder> {
        let (client, connection) = tokio_postgres::connect(&self.url, NoTls)
            .await
            .context("holder failed to connect")?;
        let driver = tokio::spawn(async move {
            let _ = connection.await;
        });
        client
            .execute("SELECT pg_advisory_lock($1)", &[&i64::from(lock_id)])
            .await
            .context("holder failed to take the lock")?;
        Ok(Holder {
            client: Some(client),
            driver,
        })
    }
}

/// Another session holding an advisory lock.
pub struct Holder {
    client: Option<Client>,
    driver: tokio::task::JoinHandle<()>,
}

impl Holder {
    /// End the holding session after `after`.
    pub async fn release_after(mut self, after: Duration) {
        tokio::time::sleep(after).await;
        drop(self.client.take());
        let _ = self.driver.await;
    }
}
