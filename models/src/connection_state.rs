use serde::Serialize;

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Lifecycle state of a stream session.
///
/// A session moves `Disconnected -> Connecting -> Connected`; an unplanned
/// close moves it to `ReconnectScheduled` (or back to `Disconnected` when
/// reconnection is disabled), and an explicit disconnect or an exhausted
/// reconnect budget moves it to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectScheduled,
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// A socket exists (or is being opened) for the session.
    pub fn has_live_socket(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::ReconnectScheduled => "reconnect_scheduled",
            ConnectionState::Closed => "closed",
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl Display for ConnectionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}
