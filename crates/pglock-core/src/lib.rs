//! pglock-core - lock coordination and guarded execution
//!
//! This crate provides:
//! - The resolved configuration value object
//! - The lock coordinator (try / bounded-wait acquisition of an advisory lock)
//! - A tokio-postgres backed lock session
//! - The guarded executor that runs a command only while the lock is held
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, Error>`. Use:
//! - `?` operator for propagation
//! - `map`, `and_then` combinators for transformation
//! - `match` / `map_or` / `unwrap_or_else` for defaults

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod executor;
pub mod lock;
pub mod postgres;

pub use config::{CommandLine, Config, SslMode};
pub use error::{CommandError, Error, Result};
pub use executor::{Execution, GuardedExecutor, Launcher, ProcessLauncher};
pub use lock::{LockCoordinator, LockOutcome, LockRequest, LockSession};
pub use postgres::PgSession;
