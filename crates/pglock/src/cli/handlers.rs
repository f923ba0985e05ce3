//! Turning parsed arguments into a lock attempt and a guarded run

use anyhow::{Context, Result};
use clap::ArgMatches;
use pglock_core::{
    CommandLine, Config, Execution, GuardedExecutor, Launcher, LockCoordinator, PgSession,
    ProcessLauncher, SslMode,
};
use tracing::info;

use super::args::{
    ARG_COMMAND, ARG_DATABASE, ARG_HOST, ARG_LOCKID, ARG_PORT, ARG_SSLMODE, ARG_USER, ARG_WAIT,
    ENV_PASS,
};

/// Parse, connect, lock, and run.
pub async fn run_cli(matches: &ArgMatches) -> Result<Execution> {
    let password = std::env::var(ENV_PASS).ok();
    let config = config_from_matches(matches, password)?;
    run(&config, ProcessLauncher).await
}

/// Build and validate the configuration from parsed arguments.
///
/// The password is passed in separately because it never comes from a flag.
pub fn config_from_matches(
    matches: &ArgMatches,
    password: Option<String>,
) -> pglock_core::Result<Config> {
    let tokens = matches
        .get_many::<String>(ARG_COMMAND)
        .map(|values| values.cloned().collect::<Vec<_>>())
        .unwrap_or_default();
    let command = CommandLine::from_tokens(tokens)?;

    let ssl_mode = string_arg(matches, ARG_SSLMODE)
        .map_or(Ok(SslMode::default()), str::parse::<SslMode>)?;

    let mut config = Config::new(string_arg(matches, ARG_USER).unwrap_or_default(), command);
    config.password = password.filter(|p| !p.is_empty());
    config.ssl_mode = ssl_mode;
    if let Some(host) = string_arg(matches, ARG_HOST) {
        config.host = host.to_string();
    }
    if let Some(database) = string_arg(matches, ARG_DATABASE) {
        config.database = database.to_string();
    }
    if let Some(port) = matches.get_one::<u16>(ARG_PORT) {
        config.port = *port;
    }
    if let Some(lock_id) = matches.get_one::<u32>(ARG_LOCKID) {
        config.lock_id = *lock_id;
    }
    if let Some(wait) = matches.get_one::<u32>(ARG_WAIT) {
        config.wait_seconds = *wait;
    }

    config.validate()?;
    Ok(config)
}

/// Hold one database session for the whole invocation.
///
/// The session is closed on every path after the connect succeeds, so the
/// lock is released when this returns.
pub async fn run<L: Launcher>(config: &Config, launcher: L) -> Result<Execution> {
    info!(server = %config.display_target(), "Connecting to PostgreSQL");
    let session = PgSession::connect(config).await?;

    let outcome = LockCoordinator::new(&session)
        .acquire(&config.lock_request())
        .await;
    let execution = GuardedExecutor::new(launcher)
        .run(outcome, config.lock_id, &config.command)
        .await;

    session.close().await;
    execution.with_context(|| format!("lock {}", config.lock_id))
}

fn string_arg<'a>(matches: &'a ArgMatches, id: &str) -> Option<&'a str> {
    matches.get_one::<String>(id).map(String::as_str)
}
