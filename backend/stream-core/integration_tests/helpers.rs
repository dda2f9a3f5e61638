//! Test helpers for session integration tests.
//!
//! This module provides:
//! - A scripted in-memory transport that counts sockets and records writes
//! - A pump settle helper for paused-clock tests
//! - A local tokio-tungstenite server for real-socket tests

use stream_core::error::TransportError;
use stream_core::{CloseInfo, EventSink, Socket, Transport, TransportEvent};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use url::Url;

/// Test constants
pub const TEST_TARGET: u64 = 42;
pub const TEST_HOST: &str = "dashboard.test:8080";

#[derive(Default)]
struct Script {
    opens: usize,
    live: usize,
    max_live: usize,
    refuse: bool,
    urls: Vec<Url>,
    sinks: Vec<EventSink>,
    sent: Vec<String>,
}

/// In-memory transport. Clones share state, so a test keeps one clone and
/// hands another to the session.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// Sockets opened so far.
    pub fn opens(&self) -> usize {
        self.script.lock().unwrap().opens
    }

    /// Sockets opened and not yet closed.
    pub fn live(&self) -> usize {
        self.script.lock().unwrap().live
    }

    /// Highest number of simultaneously live sockets ever observed.
    pub fn max_live(&self) -> usize {
        self.script.lock().unwrap().max_live
    }

    pub fn urls(&self) -> Vec<Url> {
        self.script.lock().unwrap().urls.clone()
    }

    /// Frames the session wrote, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.script.lock().unwrap().sent.clone()
    }

    /// Refuse every subsequent open.
    pub fn refuse_opens(&self) {
        self.script.lock().unwrap().refuse = true;
    }

    fn sink(&self) -> EventSink {
        self.script
            .lock()
            .unwrap()
            .sinks
            .last()
            .cloned()
            .expect("no socket opened yet")
    }

    /// Simulate the handshake completing on the newest socket.
    pub fn open_latest(&self) {
        self.sink().emit(TransportEvent::Open);
    }

    /// Simulate the server pushing a text frame on the newest socket.
    pub fn push(&self, frame: &str) {
        self.sink().emit(TransportEvent::Message(frame.to_string()));
    }

    /// Simulate the server closing the newest socket.
    pub fn server_close(&self, code: u16, reason: &str) {
        self.sink()
            .emit(TransportEvent::Close(CloseInfo::new(code, reason)));
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Socket>, TransportError> {
        let mut script = self.script.lock().unwrap();
        if script.refuse {
            return Err(TransportError::Open {
                message: "connection refused".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        script.opens += 1;
        script.live += 1;
        script.max_live = script.max_live.max(script.live);
        script.urls.push(url.clone());
        script.sinks.push(sink);

        Ok(Box::new(MockSocket {
            script: Arc::clone(&self.script),
            open: true,
        }))
    }
}

struct MockSocket {
    script: Arc<Mutex<Script>>,
    open: bool,
}

impl Socket for MockSocket {
    fn send_text(&mut self, text: String) -> bool {
        if !self.open {
            return false;
        }
        self.script.lock().unwrap().sent.push(text);
        true
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.script.lock().unwrap().live -= 1;
        }
    }
}

impl Drop for MockSocket {
    fn drop(&mut self) {
        self.close();
    }
}

/// Test helper: Let the session's event pump drain its queue.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Test helper: Move the paused clock forward and let timers fire.
pub async fn elapse(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

/// Test helper: Bind a WebSocket server on an ephemeral local port.
pub async fn bind_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let host = listener
        .local_addr()
        .expect("Failed to read local address")
        .to_string();
    (listener, host)
}

/// Test helper: Accept one client and complete the WebSocket handshake.
pub async fn accept_client(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.expect("Failed to accept client");
    tokio_tungstenite::accept_async(stream)
        .await
        .expect("WebSocket handshake failed")
}

/// Test helper: Poll `condition` until it holds or five seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
