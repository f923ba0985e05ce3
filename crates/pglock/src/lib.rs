//! pglock - run a command while holding a PostgreSQL advisory lock
//!
//! Concurrent invocations that fail to obtain the lock skip the command and
//! exit with status 0.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod logging;
