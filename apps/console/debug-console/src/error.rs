use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use stream_core::CoreError;
use stream_core::error::ConfigError;
use thiserror::Error;

/// Errors that end the console before or while it runs.
///
/// Serializable so a fatal error lands in the log file as structured JSON.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ConsoleError {
    /// Error from this app (logger, directories, stdin)
    #[error("Console Error: {message} {location}")]
    Console {
        message: String,
        location: ErrorLocation,
    },

    /// Config file or environment could not be used
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Session could not be constructed
    #[error("Session Error: {message} {location}")]
    Session {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for ConsoleError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        ConsoleError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<CoreError> for ConsoleError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        ConsoleError::Session {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
