//! The interactive part: session wiring, stdin commands, event printing.

use crate::cli::Cli;
use crate::error::ConsoleError;

use common::ErrorLocation;

use std::fmt::Write as _;
use std::panic::Location;
use std::str::FromStr;

use log::{debug, info, warn};
use serde_json::Value;
use stream_core::{
    CommandKind, DebugSession, ErrorPayload, LogPayload, StateChangePayload, StreamConfig,
    TargetId,
};
use tokio::io::{AsyncBufReadExt, BufReader, stdin};

const HELP: &str = "commands: continue | pause | step_over (next) | step_into (in) | \
                    step_out (out) | restart | stop | reconnect | status | help | quit";

// ============================================
// COMMANDS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Send(CommandKind),
    Reconnect,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let word = line.trim().to_ascii_lowercase();
        let command = match word.as_str() {
            "next" => ConsoleCommand::Send(CommandKind::StepOver),
            "in" => ConsoleCommand::Send(CommandKind::StepInto),
            "out" => ConsoleCommand::Send(CommandKind::StepOut),
            "reconnect" => ConsoleCommand::Reconnect,
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            other => other
                .parse::<CommandKind>()
                .map(ConsoleCommand::Send)
                .map_err(|_| format!("unknown command '{other}' ({HELP})"))?,
        };
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run one console command against the session.
///
/// Returns whether to keep reading and the line to show the user.
pub fn execute(session: &DebugSession, command: ConsoleCommand) -> (Flow, String) {
    match command {
        ConsoleCommand::Send(kind) => {
            let message = if session.send(kind) {
                format!("> {kind}")
            } else {
                format!("> {kind} not delivered: stream is {}", session.connection_state())
            };
            (Flow::Continue, message)
        }
        ConsoleCommand::Reconnect => {
            session.reconnect();
            (Flow::Continue, format!("reconnecting to {}", session.endpoint()))
        }
        ConsoleCommand::Status => (Flow::Continue, format_status(session)),
        ConsoleCommand::Help => (Flow::Continue, HELP.to_string()),
        ConsoleCommand::Quit => (Flow::Quit, "bye".to_string()),
    }
}

// ============================================
// SESSION
// ============================================

/// Build and connect a session that prints every event to stdout.
pub fn open_session(cli: &Cli, config: &StreamConfig) -> Result<DebugSession, ConsoleError> {
    let session = DebugSession::builder(TargetId::from(cli.target.as_str()))
        .with_config(config)
        .with_feature(cli.feature.clone())
        .on_connect(|| println!("* connected"))
        .on_disconnect(|info| match info.code {
            Some(code) => println!("* disconnected ({code} {})", info.reason),
            None => println!("* disconnected ({})", info.reason),
        })
        .on_log(|log| println!("{}", format_log(log)))
        .on_variables(|variables| println!("{}", format_variables(variables)))
        .on_state_change(|change| println!("{}", format_state(change)))
        .on_error(|error| println!("{}", format_error(error)))
        .open()?;

    info!(
        "Session {} opened for target {} at {}",
        session.id(),
        session.target(),
        session.endpoint()
    );
    Ok(session)
}

/// Read commands until `quit`, Ctrl-C, or a read error.
///
/// When stdin reaches EOF the stream keeps printing until Ctrl-C, so the
/// console also works as a plain log follower.
pub async fn run(session: DebugSession) -> Result<(), ConsoleError> {
    let mut lines = BufReader::new(stdin()).lines();
    let mut stdin_open = true;
    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<ConsoleCommand>() {
                        Ok(command) => {
                            debug!("Console command: {:?}", command);
                            let (flow, message) = execute(&session, command);
                            println!("{message}");
                            if flow == Flow::Quit {
                                break;
                            }
                        }
                        Err(message) => println!("{message}"),
                    }
                }
                Ok(None) => {
                    info!("stdin closed; following the stream until Ctrl-C");
                    stdin_open = false;
                }
                Err(e) => {
                    return Err(ConsoleError::Console {
                        message: format!("Failed to read stdin: {e}"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Interrupted");
                break;
            }
        }
    }

    drop(session);
    Ok(())
}

// ============================================
// FORMATTING
// ============================================

pub fn format_log(log: &LogPayload) -> String {
    let mut line = String::new();
    if let Some(timestamp) = &log.timestamp {
        match timestamp {
            Value::String(text) => {
                let _ = write!(line, "{text} ");
            }
            other => {
                let _ = write!(line, "{other} ");
            }
        }
    }
    let level = log.level.as_deref().unwrap_or("log").to_ascii_uppercase();
    let _ = write!(line, "[{level}] {}", log.message);
    if !log.fields.is_empty() {
        let _ = write!(line, " {}", Value::Object(log.fields.clone()));
    }
    line
}

pub fn format_variables(variables: &Value) -> String {
    match variables {
        Value::Object(map) if !map.is_empty() => {
            let mut out = String::from("variables:");
            for (name, value) in map {
                let _ = write!(out, "\n  {name} = {value}");
            }
            out
        }
        Value::Object(_) => "variables: (none)".to_string(),
        other => format!("variables: {other}"),
    }
}

pub fn format_state(change: &StateChangePayload) -> String {
    if change.detail.is_empty() {
        format!("state: {}", change.state)
    } else {
        format!(
            "state: {} {}",
            change.state,
            Value::Object(change.detail.clone())
        )
    }
}

pub fn format_error(error: &ErrorPayload) -> String {
    match &error.code {
        Some(code) => format!("error ({code}): {}", error.message),
        None => format!("error: {}", error.message),
    }
}

pub fn format_status(session: &DebugSession) -> String {
    let mut status = format!(
        "target {} via {}: {}",
        session.target(),
        session.endpoint(),
        session.connection_state()
    );
    if session.has_pending_reconnect() {
        let _ = write!(
            status,
            ", reconnect attempt {} pending",
            session.reconnect_attempts()
        );
    }
    if let Some(error) = session.connection_error() {
        let _ = write!(status, ", last error: {}", error.message());
    }
    status
}
