//! Real-time debug/log stream client.
//!
//! A [`DebugSession`] binds one consumer to one remote target over a duplex
//! WebSocket. It keeps the link alive across network blips, routes typed
//! server events to the handlers registered on the builder, and offers a
//! command channel that refuses to write while the link is down.
//!
//! # Layers
//!
//! - `lifecycle` - socket ownership, connection state and the reconnect policy
//! - [`dispatcher`] - envelope parsing and per-type routing
//! - `command` - connected-only command delivery
//! - [`session`] - the public facade composing the three; the only way in to
//!   the two private layers above
//!
//! The [`transport`] module is the seam to the network: [`WsTransport`] is
//! the production implementation, tests inject their own.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod transport;

mod command;
mod lifecycle;

#[cfg(test)]
mod tests;

pub use config::{EndpointConfig, ReconnectPolicy, StreamConfig};
pub use dispatcher::{DispatchOutcome, Dispatcher, EventHandlers};
pub use error::CoreError;
pub use session::{DebugSession, DebugSessionBuilder};
pub use transport::websocket::WsTransport;
pub use transport::{CloseInfo, EventSink, Socket, SocketId, Transport, TransportEvent};

pub use models::{
    CommandKind, ConnectionState, DEBUG_FEATURE, DEPLOYMENT_LOGS_FEATURE, ErrorPayload,
    ExecutionState, InboundEvent, InboundKind, LogPayload, OutboundCommand, StateChangePayload,
    TargetId,
};
