//! pglock CLI
//!
//! Binary name: `pglock`

use std::process;

use pglock::cli::{args::config_error, build_cli, handlers::run_cli};

#[tokio::main]
async fn main() {
    pglock::logging::init();

    let matches = build_cli().try_get_matches().unwrap_or_else(|err| {
        let Some(config) = config_error(&err) else {
            err.exit()
        };
        tracing::error!(kind = config.kind(), "{config}");

        #[allow(clippy::exit)]
        process::exit(config.exit_code());
    });

    if let Err(err) = run_cli(&matches).await {
        let core = err.downcast_ref::<pglock_core::Error>();
        let kind = core.map_or("internal", pglock_core::Error::kind);
        tracing::error!(kind, "{err:#}");

        let code = core.map_or(1, pglock_core::Error::exit_code);

        #[allow(clippy::exit)]
        process::exit(code);
    }
}
