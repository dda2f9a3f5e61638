use crate::error::ConsoleError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::PathBuf;

use clap::Parser;
use stream_core::{DEBUG_FEATURE, StreamConfig};

const APP_DIR: &str = "debug-console";

/// Debug console - attach to a remote step-debugger or follow deployment logs
#[derive(Parser, Debug)]
#[command(name = "debug-console")]
#[command(version)]
#[command(about = "Attach to a remote step-debugger or follow deployment logs")]
#[command(long_about = "Opens a live debug stream for one target and prints every event it receives.

Type commands on stdin while attached:
  continue, pause, step_over (next), step_into (in), step_out (out),
  restart, stop, reconnect, status, help, quit

Settings come from stream.json in the config directory, then DEBUG_STREAM_*
environment variables (a .env file is honoured), then these flags.")]
pub struct Cli {
    /// Debug run or deployment id to attach to
    #[arg(short, long)]
    pub target: String,

    /// Stream feature: `debug` for the step-debugger, `deployments` for deployment logs
    #[arg(short, long, default_value = DEBUG_FEATURE)]
    pub feature: String,

    /// Dashboard host[:port] (overrides any configured base URL)
    #[arg(long, conflicts_with = "base_url")]
    pub host: Option<String>,

    /// Dashboard origin, e.g. https://dashboard.example.com
    #[arg(long)]
    pub base_url: Option<String>,

    /// Use wss:// with --host
    #[arg(long)]
    pub secure: bool,

    /// Fixed delay between reconnect attempts, in milliseconds
    #[arg(long)]
    pub reconnect_ms: Option<u64>,

    /// Give up after this many consecutive failed reconnects
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Do not reconnect after the server closes the stream
    #[arg(long)]
    pub no_reconnect: bool,

    /// Directory holding stream.json (defaults to the platform config dir)
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Directory for debug-console.log (defaults to the platform data dir)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log at trace level
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Layer the command-line flags over a loaded config.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Config`] if the result does not validate.
    pub fn apply_overrides(&self, config: &mut StreamConfig) -> Result<(), ConsoleError> {
        if let Some(host) = &self.host {
            config.endpoint.host = Some(host.clone());
            config.endpoint.base_url = None;
        }
        if let Some(base_url) = &self.base_url {
            config.endpoint.base_url = Some(base_url.clone());
        }
        if self.secure {
            config.endpoint.secure = true;
        }
        if let Some(delay_ms) = self.reconnect_ms {
            config.reconnect.delay_ms = delay_ms;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.reconnect.max_attempts = Some(max_attempts);
        }
        if self.no_reconnect {
            config.reconnect.enabled = false;
        }

        config.validate()?;
        Ok(())
    }

    pub fn config_dir(&self) -> Result<PathBuf, ConsoleError> {
        match &self.config_dir {
            Some(dir) => Ok(dir.clone()),
            None => platform_dir(dirs::config_dir(), "config"),
        }
    }

    pub fn log_dir(&self) -> Result<PathBuf, ConsoleError> {
        match &self.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => platform_dir(dirs::data_local_dir(), "data").map(|dir| dir.join("logs")),
        }
    }
}

#[track_caller]
fn platform_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf, ConsoleError> {
    base.map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| ConsoleError::Console {
            message: format!("No platform {kind} directory; pass it explicitly"),
            location: ErrorLocation::from(Location::caller()),
        })
}
