pub mod config;
pub mod frame;
pub mod stream;
pub mod transport;

pub use config::ConfigError;
pub use frame::FrameError;
pub use stream::StreamError;
pub use transport::TransportError;

use models::ModelError;

use thiserror::Error;

/// Every error `stream-core` can hand back across its construction-time API.
///
/// Runtime connection failures never surface here; they are recorded on the
/// session and read through `connection_error()`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
