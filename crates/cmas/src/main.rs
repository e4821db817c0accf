mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::{CommandFactory, FromArgMatches};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cmas_core::SiteServer;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let matches = Cli::command().get_matches();
    let mut cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    // Config file supplies output/color defaults the flags left untouched
    let cfg = config::load_config_or_default();
    config::apply_defaults(&mut cli.global, &matches, &cfg);

    init_tracing(cli.global.verbose);

    // Ctrl-C cancels in-flight requests instead of killing mid-write
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let profile_name = config::active_profile_name(&cli.global, &cfg);
    if let Err(err) = run(cli, &cfg, cancel).await {
        let err = err.with_profile(&profile_name);
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, cfg: &Config, cancel: CancellationToken) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a site server
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "cmas", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let connection = config::resolve_connection(&cli.global, cfg)?;
            let site = SiteServer::connect_with_cancellation(connection, cancel).await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &site, &cli.global).await
        }
    }
}
