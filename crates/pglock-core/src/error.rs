//! Error types for pglock
//!
//! Errors fall into four categories, each with its own exit code:
//!
//! - **Configuration**: missing or invalid input, detected before connecting (exit code 1)
//! - **Connection**: the database session could not be established or used (exit code 2)
//! - **Lock query**: the server rejected the lock query (exit code 2)
//! - **Command**: the guarded command failed after the lock was obtained
//!   (the command's own exit code, `128 + signal`, or 127 when it could not start)
//!
//! A lock query cancelled at the wait deadline is not an error: it surfaces here
//! as a `LockQuery` carrying SQLSTATE `57014`, which the coordinator turns into
//! a "not acquired" outcome.

use thiserror::Error;

/// SQLSTATE reported by PostgreSQL when a running statement is cancelled.
pub const QUERY_CANCELED: &str = "57014";

/// Core error type for pglock operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database session could not be established or used
    #[error("Error connecting PostgreSQL: {0}")]
    Connection(String),

    /// Server failed the lock query
    #[error("Error trying to obtain lock: {message}")]
    LockQuery {
        sqlstate: Option<String>,
        message: String,
    },

    /// Guarded command failed
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Failures of the guarded command itself. The lock was held when these occurred.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to start command '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Command '{program}' exited with status {code}")]
    Exited { program: String, code: i32 },

    #[error("Command '{program}' was terminated by signal {signal}")]
    Signaled { program: String, signal: i32 },
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn lock_query(sqlstate: Option<String>, message: impl Into<String>) -> Self {
        Self::LockQuery {
            sqlstate,
            message: message.into(),
        }
    }

    /// True when the server reported that the lock query was cancelled.
    pub fn is_query_canceled(&self) -> bool {
        matches!(
            self,
            Self::LockQuery { sqlstate: Some(code), .. } if code == QUERY_CANCELED
        )
    }

    /// Short stable label for structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Connection(_) => "connection",
            Self::LockQuery { .. } => "lock_query",
            Self::Command(_) => "command",
        }
    }

    /// Returns the process exit code for this error.
    ///
    /// Exit code scheme:
    /// - 1: configuration error
    /// - 2: connection or lock query error
    /// - 127: command could not be started
    /// - n: command exited with status n
    /// - 128 + s: command was terminated by signal s
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Connection(_) | Self::LockQuery { .. } => 2,
            Self::Command(err) => err.exit_code(),
        }
    }
}

impl CommandError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Spawn { .. } => 127,
            // A zero status never reaches here; clamp anyway so a failure never exits 0
            Self::Exited { code, .. } => {
                if *code == 0 {
                    1
                } else {
                    *code
                }
            }
            Self::Signaled { signal, .. } => 128 + *signal,
        }
    }
}

/// Result type alias for pglock operations
pub type Result<T> = std::result::Result<T, Error>;
