//! Resolved configuration for a single pglock invocation
//!
//! `Config` is built once at startup (from flags and `PGLOCK_*` environment
//! variables by the CLI) and handed to the coordinator and executor. Nothing in
//! this crate reads flags or the environment on its own.

use std::{fmt, str::FromStr};

use crate::{lock::LockRequest, Error, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DATABASE: &str = "postgres";
pub const DEFAULT_LOCK_ID: u32 = 1;
pub const APPLICATION_NAME: &str = "pglock";

/// TLS policy for the database connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Plain TCP only
    #[default]
    Disable,
    /// TLS when the server offers it, plain otherwise
    Prefer,
    /// TLS required, certificate not verified
    Require,
    /// TLS required, certificate chain verified, hostname not checked
    VerifyCa,
    /// TLS required, certificate chain and hostname verified
    VerifyFull,
}

impl SslMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }

    pub const fn uses_tls(self) -> bool {
        !matches!(self, Self::Disable)
    }
}

impl FromStr for SslMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            other => Err(Error::config(format!(
                "Unsupported SSL mode '{other}' (expected disable, prefer, require, verify-ca or verify-full)"
            ))),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The guarded command: a program and its arguments, run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Build a command line from positional tokens.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if there are no tokens or the program is empty.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens = tokens.into_iter().map(Into::into);
        let program = tokens
            .next()
            .filter(|program| !program.trim().is_empty())
            .ok_or_else(|| {
                Error::config("Need at least one positional argument (command to run).")
            })?;

        Ok(Self {
            program,
            args: tokens.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        self.args
            .iter()
            .try_for_each(|arg| write!(f, " {arg}"))
    }
}

/// Everything one invocation needs: where to connect, which lock, what to run.
#[derive(Clone)]
pub struct Config {
    pub user: String,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub ssl_mode: SslMode,
    pub lock_id: u32,
    pub wait_seconds: u32,
    pub command: CommandLine,
}

impl Config {
    /// Configuration with default connection settings for the given user and command.
    pub fn new(user: impl Into<String>, command: CommandLine) -> Self {
        Self {
            user: user.into(),
            password: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            ssl_mode: SslMode::default(),
            lock_id: DEFAULT_LOCK_ID,
            wait_seconds: 0,
            command,
        }
    }

    /// Check the values that must be present before any database interaction.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the user or the command program is empty.
    pub fn validate(&self) -> Result<()> {
        if self.user.trim().is_empty() {
            return Err(Error::config("Username cannot be empty."));
        }
        if self.host.trim().is_empty() {
            return Err(Error::config("Host cannot be empty."));
        }
        if self.command.program().trim().is_empty() {
            return Err(Error::config(
                "Need at least one positional argument (command to run).",
            ));
        }
        Ok(())
    }

    pub const fn lock_request(&self) -> LockRequest {
        LockRequest::new(self.lock_id, self.wait_seconds)
    }

    /// `user@host:port/database`, safe for logs.
    pub fn display_target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }

    /// Connection parameters for tokio-postgres, set field by field.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.user(self.user.as_str())
            .host(self.host.as_str())
            .port(self.port)
            .dbname(self.database.as_str())
            .application_name(APPLICATION_NAME)
            .ssl_mode(match self.ssl_mode {
                SslMode::Disable => tokio_postgres::config::SslMode::Disable,
                SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
                SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
                    tokio_postgres::config::SslMode::Require
                }
            });
        if let Some(password) = &self.password {
            pg.password(password.as_str());
        }
        pg
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("lock_id", &self.lock_id)
            .field("wait_seconds", &self.wait_seconds)
            .field("command", &self.command)
            .finish()
    }
}
