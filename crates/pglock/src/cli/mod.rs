//! Command line front end
//!
//! Every flag can also be set through a `PGLOCK_`-prefixed environment
//! variable. The password is only read from `PGLOCK_PASS`.

pub mod args;
pub mod handlers;

pub use args::build_cli;
