use debug_console::cli::Cli;
use debug_console::console;
use debug_console::error::ConsoleError;
use debug_console::logger::{initialize as LoggerInitialize, level_for};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use stream_core::StreamConfig;
use stream_core::config::load_dotenv;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let structured = serde_json::to_string(&e).unwrap_or_else(|_| e.to_string());
            error!("{structured}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ConsoleError> {
    let log_dir = cli.log_dir()?;
    create_dir_all(&log_dir).map_err(|e| ConsoleError::Console {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir, level_for(cli.verbose))?;

    info!("Debug console starting");
    info!("Log directory: {}", log_dir.display());

    load_dotenv();

    let config_dir = cli.config_dir()?;
    let mut config = StreamConfig::load(&config_dir)?;
    config.apply_env_overrides()?;
    cli.apply_overrides(&mut config)?;

    let session = console::open_session(&cli, &config)?;
    console::run(session).await?;

    info!("Debug console stopped");
    Ok(())
}
