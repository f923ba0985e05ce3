//! CLI argument definitions

use clap::{error::ErrorKind, Arg, ArgAction, Command};
use pglock_core::config::{DEFAULT_DATABASE, DEFAULT_HOST};

pub const ARG_USER: &str = "user";
pub const ARG_HOST: &str = "host";
pub const ARG_PORT: &str = "port";
pub const ARG_DATABASE: &str = "database";
pub const ARG_SSLMODE: &str = "sslmode";
pub const ARG_LOCKID: &str = "lockid";
pub const ARG_WAIT: &str = "wait";
pub const ARG_COMMAND: &str = "command";

/// Environment variable holding the database password.
pub const ENV_PASS: &str = "PGLOCK_PASS";

pub fn build_cli() -> Command {
    Command::new("pglock")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run a command while holding a lock in a PostgreSQL database")
        .long_about(
            "pglock runs a command while holding a lock in a PostgreSQL database.\n\
             \n\
             Any concurrent invocations that fail to obtain a lock will not run\n\
             the given command and will exit with return code 0.\n\
             \n\
             The flags below can be configured as environment variables with the PGLOCK_ prefix.\n\
             PGLOCK_PASS needs to be configured to authenticate to the database.",
        )
        .arg(
            Arg::new(ARG_LOCKID)
                .long(ARG_LOCKID)
                .env("PGLOCK_LOCKID")
                .value_name("ID")
                .value_parser(clap::value_parser!(u32))
                .default_value("1")
                .help("The numeric lock ID to claim in PostgreSQL"),
        )
        .arg(
            Arg::new(ARG_HOST)
                .long(ARG_HOST)
                .env("PGLOCK_HOST")
                .value_name("HOST")
                .default_value(DEFAULT_HOST)
                .help("Hostname of the PostgreSQL instance"),
        )
        .arg(
            Arg::new(ARG_PORT)
                .long(ARG_PORT)
                .env("PGLOCK_PORT")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16))
                .default_value("5432")
                .help("Port the PostgreSQL instance is listening on"),
        )
        .arg(
            Arg::new(ARG_DATABASE)
                .long(ARG_DATABASE)
                .env("PGLOCK_DATABASE")
                .value_name("NAME")
                .default_value(DEFAULT_DATABASE)
                .help("Database name to connect to on PostgreSQL"),
        )
        .arg(
            Arg::new(ARG_USER)
                .long(ARG_USER)
                .env("PGLOCK_USER")
                .value_name("USER")
                .default_value("")
                .hide_default_value(true)
                .help("Username to authenticate to PostgreSQL"),
        )
        .arg(
            Arg::new(ARG_SSLMODE)
                .long(ARG_SSLMODE)
                .env("PGLOCK_SSLMODE")
                .value_name("MODE")
                .default_value("disable")
                .help("The SSL mode of the PostgreSQL client (disable, prefer, require, verify-ca, verify-full)"),
        )
        .arg(
            Arg::new(ARG_WAIT)
                .long(ARG_WAIT)
                .env("PGLOCK_WAIT")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u32))
                .default_value("0")
                .help("Amount of seconds to wait for a lock to be obtained"),
        )
        .arg(
            Arg::new(ARG_COMMAND)
                .value_name("COMMAND")
                .required(true)
                .num_args(1..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
                .action(ArgAction::Append)
                .help("Command to run while holding the lock, followed by its arguments"),
        )
        .after_help(
            "EXAMPLES:\n  \
             # Run a nightly job at most once across all hosts\n  \
             PGLOCK_PASS=secret pglock --user cron --host db.internal --lockid 42 -- /usr/local/bin/nightly.sh\n\
             \n  \
             # Wait up to 30 seconds for the previous run to finish\n  \
             pglock --user cron --lockid 42 --wait 30 backup.sh --full",
        )
}

/// Maps a clap parse failure onto the configuration error taxonomy.
///
/// The command is the only required argument, so a missing required
/// argument is a missing command. Other parse failures (including `--help`
/// and `--version`) return `None` and are left to clap.
pub fn config_error(err: &clap::Error) -> Option<pglock_core::Error> {
    (err.kind() == ErrorKind::MissingRequiredArgument).then(|| {
        pglock_core::Error::config("Need at least one positional argument (command to run).")
    })
}
