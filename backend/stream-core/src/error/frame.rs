use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Why an inbound frame was dropped.
///
/// Frame errors never leave the dispatcher: they are logged and the frame
/// is discarded without touching the connection.
#[derive(Debug, Clone, ThisError)]
pub enum FrameError {
    #[error("Malformed Frame Error: {message} {location}")]
    Malformed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown Frame Type Error: {kind} {location}")]
    UnknownType {
        kind: String,
        location: ErrorLocation,
    },

    #[error("Frame Payload Error: {kind}: {message} {location}")]
    Payload {
        kind: String,
        message: String,
        location: ErrorLocation,
    },
}

impl From<serde_json::Error> for FrameError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        FrameError::Malformed {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
