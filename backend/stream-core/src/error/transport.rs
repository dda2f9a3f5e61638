use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;
use tokio::runtime::TryCurrentError;

/// Failure to create a socket.
#[derive(Debug, Clone, ThisError)]
pub enum TransportError {
    #[error("Open Error: {message} {location}")]
    Open {
        message: String,
        location: ErrorLocation,
    },

    #[error("Runtime Error: {message} {location}")]
    Runtime {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    pub fn message(&self) -> &str {
        match self {
            TransportError::Open { message, .. } | TransportError::Runtime { message, .. } => {
                message
            }
        }
    }
}

impl From<TryCurrentError> for TransportError {
    #[track_caller]
    fn from(error: TryCurrentError) -> Self {
        TransportError::Runtime {
            message: format!("No tokio runtime available: {error}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
