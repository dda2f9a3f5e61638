//! WebSocket transport over `tokio-tungstenite`.
//!
//! Each socket is one background task that performs the handshake, then
//! multiplexes outbound frames from an unbounded channel with inbound frames
//! from the stream. Dropping the outbound sender is the close signal: the
//! task sends a close frame and exits.

use crate::error::transport::TransportError;
use crate::transport::{CloseInfo, EventSink, Socket, Transport, TransportEvent};

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, trace, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::timeout as TokioTimeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use url::Url;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Socket>, TransportError> {
        let runtime = Handle::try_current()?;
        let (outbound_tx, outbound_rx) = unbounded_channel();

        debug!("Opening WebSocket #{} to {}", sink.socket_id(), url);
        let task = runtime.spawn(run_socket(
            url.clone(),
            self.connect_timeout,
            sink,
            outbound_rx,
        ));

        Ok(Box::new(WsSocket {
            outbound: Some(outbound_tx),
            task,
        }))
    }
}

struct WsSocket {
    outbound: Option<UnboundedSender<Message>>,
    task: JoinHandle<()>,
}

impl Socket for WsSocket {
    fn send_text(&mut self, text: String) -> bool {
        match &self.outbound {
            Some(outbound) if !self.task.is_finished() => {
                outbound.send(Message::Text(text.into())).is_ok()
            }
            _ => false,
        }
    }

    fn close(&mut self) {
        self.outbound.take();
    }
}

async fn run_socket(
    url: Url,
    connect_timeout: Duration,
    sink: EventSink,
    mut outbound: UnboundedReceiver<Message>,
) {
    let socket_id = sink.socket_id();

    let stream = match TokioTimeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            sink.emit(TransportEvent::Error(format!(
                "WebSocket handshake with {url} failed: {e}"
            )));
            sink.emit(TransportEvent::Close(CloseInfo::abnormal("handshake failed")));
            return;
        }
        Err(_) => {
            sink.emit(TransportEvent::Error(format!(
                "WebSocket handshake with {url} timed out after {connect_timeout:?}"
            )));
            sink.emit(TransportEvent::Close(CloseInfo::abnormal("handshake timed out")));
            return;
        }
    };

    if !sink.emit(TransportEvent::Open) {
        return;
    }

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(message) => {
                    if let Err(e) = write.send(message).await {
                        sink.emit(TransportEvent::Error(format!("Send failed: {e}")));
                        sink.emit(TransportEvent::Close(CloseInfo::abnormal("send failed")));
                        return;
                    }
                }
                None => {
                    debug!("Closing WebSocket #{socket_id}");
                    let _ = write.close().await;
                    return;
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if !sink.emit(TransportEvent::Message(text.as_str().to_owned())) {
                        return;
                    }
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => {
                        if !sink.emit(TransportEvent::Message(text)) {
                            return;
                        }
                    }
                    Err(_) => warn!(
                        "Dropping {} byte binary frame on WebSocket #{socket_id}: not UTF-8",
                        data.len()
                    ),
                },
                Some(Ok(Message::Close(frame))) => {
                    sink.emit(TransportEvent::Close(close_info(frame)));
                    let _ = write.close().await;
                    return;
                }
                Some(Ok(other)) => trace!("WebSocket #{socket_id} control frame: {other:?}"),
                Some(Err(e)) => {
                    sink.emit(TransportEvent::Error(format!("Read failed: {e}")));
                    sink.emit(TransportEvent::Close(CloseInfo::abnormal("read failed")));
                    return;
                }
                None => {
                    sink.emit(TransportEvent::Close(CloseInfo::abnormal("stream ended")));
                    return;
                }
            },
        }
    }
}

fn close_info(frame: Option<CloseFrame>) -> CloseInfo {
    match frame {
        Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason.as_str()),
        None => CloseInfo::default(),
    }
}
