use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Connection-level failures recorded on a session.
///
/// These are surfaced through `connection_error()`, never returned from
/// `connect()` or `send()`.
#[derive(Debug, Clone, ThisError)]
pub enum StreamError {
    #[error("Transport Open Error: {message} {location}")]
    TransportOpen {
        message: String,
        location: ErrorLocation,
    },

    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },

    #[error("Reconnect Exhausted Error: gave up after {attempts} attempts {location}")]
    ReconnectExhausted {
        attempts: u32,
        location: ErrorLocation,
    },

    #[error("Runtime Error: {message} {location}")]
    Runtime {
        message: String,
        location: ErrorLocation,
    },
}

impl StreamError {
    /// The message without the location suffix, for display to end users.
    pub fn message(&self) -> String {
        match self {
            StreamError::TransportOpen { message, .. }
            | StreamError::Transport { message, .. }
            | StreamError::Runtime { message, .. } => message.clone(),
            StreamError::ReconnectExhausted { attempts, .. } => {
                format!("Reconnect gave up after {attempts} attempts")
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamError::ReconnectExhausted { .. })
    }
}

impl From<TransportError> for StreamError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        StreamError::TransportOpen {
            message: error.message().to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
