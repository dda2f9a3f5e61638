//! The seam between a session and the network.
//!
//! A [`Transport`] opens sockets; a [`Socket`] writes text frames and closes.
//! Everything a socket observes (open, inbound frames, errors, close) is
//! reported through the [`EventSink`] it was opened with, which stamps each
//! event with the socket's id and queues it for the session's event pump.
//! Events from a socket the session has already replaced are discarded
//! there, so a transport never has to coordinate with the session directly.

pub mod websocket;

use crate::error::transport::TransportError;
use crate::lifecycle::LinkEvent;

use tokio::sync::mpsc::UnboundedSender;
use url::Url;

/// Generation id of a socket within one session. Strictly increasing.
pub type SocketId = u64;

/// Close code and reason, when the peer supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Close without a close frame (network failure, failed handshake).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Open,
    Message(String),
    Close(CloseInfo),
    Error(String),
}

/// Where a socket reports what happens to it.
#[derive(Debug, Clone)]
pub struct EventSink {
    socket: SocketId,
    events: UnboundedSender<LinkEvent>,
}

impl EventSink {
    pub(crate) fn new(socket: SocketId, events: UnboundedSender<LinkEvent>) -> Self {
        Self { socket, events }
    }

    pub fn socket_id(&self) -> SocketId {
        self.socket
    }

    /// Queue an event for the owning session.
    ///
    /// Returns `false` once the session is gone; the socket should stop.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events
            .send(LinkEvent::Transport {
                socket: self.socket,
                event,
            })
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// One live duplex connection.
pub trait Socket: Send {
    /// Hand a text frame to the transport.
    ///
    /// Returns `true` if the transport accepted the write. Acceptance is not
    /// delivery: the frame may still be lost if the link drops.
    fn send_text(&mut self, text: String) -> bool;

    /// Close the connection. Must be idempotent and must not block.
    fn close(&mut self);
}

/// Opens sockets to an endpoint.
///
/// `open` must return immediately; the outcome of the handshake is reported
/// later through `sink` as [`TransportEvent::Open`] or as
/// [`TransportEvent::Error`] followed by [`TransportEvent::Close`].
pub trait Transport: Send + Sync {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Socket>, TransportError>;
}
