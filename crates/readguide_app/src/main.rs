use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use readguide_app::cli::{Cli, Command};
use readguide_app::{load_config, serve, shutdown_signal, watch, AppState};
use readguide_logging::{guide_error, LogDestination};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            guide_error!("{:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let level = cli.level_filter();
    match cli.command {
        Command::Serve { config } => {
            let config = load_config(config.as_deref())?;
            let destination = match &config.log_file {
                Some(path) => LogDestination::Both(path.clone()),
                None => LogDestination::Terminal,
            };
            readguide_logging::initialize(destination, level);

            let addr = config.listen_addr()?;
            let state = AppState::from_config(&config).context("building the generator")?;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            serve(listener, state, shutdown_signal()).await?;
            Ok(ExitCode::SUCCESS)
        }
        command @ Command::Watch { .. } => {
            readguide_logging::initialize(LogDestination::Terminal, level);
            let Some(args) = command.watch_args() else {
                return Ok(ExitCode::FAILURE);
            };
            let exit = watch::run(args).await?;
            Ok(ExitCode::from(exit.code()))
        }
    }
}
