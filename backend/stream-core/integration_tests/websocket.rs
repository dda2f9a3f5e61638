use crate::helpers::{accept_client, bind_server, wait_until};

use stream_core::error::StreamError;
use stream_core::{CloseInfo, ConnectionState, DebugSession, ReconnectPolicy, WsTransport};

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

const FAST_RECONNECT: Duration = Duration::from_millis(100);

/// **VALUE**: Real socket round trip: frames in, command out.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The tungstenite transport dialing the wrong path
/// - Inbound text frames not reaching the dispatcher
/// - Commands not being flushed to the wire
#[tokio::test]
async fn given_real_server_when_frames_and_commands_flow_then_round_trip_works() {
    // GIVEN: A local WebSocket server that records the request path, pushes
    // a log frame and reports the first frame it receives
    let (listener, host) = bind_server().await;
    let (path_tx, path_rx) = oneshot::channel();
    let (command_tx, command_rx) = oneshot::channel();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let record_path = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let _ = path_tx.send(request.uri().path().to_string());
            Ok(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, record_path)
            .await
            .expect("handshake");

        ws.send(Message::Text(
            r#"{"type":"log","payload":{"message":"worker started","level":"info"}}"#.into(),
        ))
        .await
        .expect("send log");

        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                let _ = command_tx.send(text.as_str().to_owned());
                break;
            }
        }
    });

    // GIVEN: A session on the real transport forwarding logs to a channel
    let (log_tx, mut log_rx) = unbounded_channel();
    let session = DebugSession::builder(42u64)
        .with_host(host)
        .with_transport(Arc::new(WsTransport::new()))
        .on_log(move |log| {
            let _ = log_tx.send(log.message.clone());
        })
        .open()
        .expect("session should open");

    // WHEN: The log frame arrives
    let message = tokio::time::timeout(Duration::from_secs(5), log_rx.recv())
        .await
        .expect("log should arrive")
        .expect("channel open");

    // THEN: Delivered through the dispatcher, on the derived path
    assert_eq!(message, "worker started");
    assert_eq!(path_rx.await.expect("path"), "/api/debug/42/ws");
    assert!(session.is_connected());

    // WHEN: Sending a command
    assert!(session.continue_execution());

    // THEN: The server received the exact envelope
    let command = tokio::time::timeout(Duration::from_secs(5), command_rx)
        .await
        .expect("command should arrive")
        .expect("server reported");
    assert_eq!(command, r#"{"type":"command","command":"continue"}"#);

    server.await.expect("server task");
}

/// **VALUE**: Verifies a server-initiated close over a real socket is
/// reported with its code and followed by a reconnect.
#[tokio::test]
async fn given_real_server_when_server_closes_then_reports_close_and_reconnects() {
    // GIVEN: A server that closes the first client and keeps the second
    let (listener, host) = bind_server().await;
    let server = tokio::spawn(async move {
        let mut first = accept_client(&listener).await;
        first
            .close(Some(CloseFrame {
                code: CloseCode::Restart,
                reason: "restarting".into(),
            }))
            .await
            .expect("close first");
        let _ = first.next().await;

        let mut second = accept_client(&listener).await;
        while let Some(Ok(_)) = second.next().await {}
    });

    let (close_tx, mut close_rx) = unbounded_channel::<CloseInfo>();
    let (connect_tx, mut connect_rx) = unbounded_channel::<()>();
    let session = DebugSession::builder("run-7")
        .with_base_url(format!("http://{host}"))
        .with_reconnect_policy(ReconnectPolicy::fixed(FAST_RECONNECT))
        .on_connect(move || {
            let _ = connect_tx.send(());
        })
        .on_disconnect(move |info| {
            let _ = close_tx.send(info.clone());
        })
        .open()
        .expect("session should open");

    // WHEN: The server closes the first connection
    let info = tokio::time::timeout(Duration::from_secs(5), close_rx.recv())
        .await
        .expect("close should be reported")
        .expect("channel open");

    // THEN: The close code is passed through
    assert_eq!(info.code, Some(1012));
    assert_eq!(info.reason, "restarting");

    // THEN: Two connects in total, the second after the reconnect delay
    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(5), connect_rx.recv())
            .await
            .expect("connect should be reported")
            .expect("channel open");
    }
    assert!(session.is_connected());

    drop(session);
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should see the client leave")
        .expect("server task");
}

/// **VALUE**: Verifies a dead endpoint ends in the exhausted state.
///
/// **BUG THIS CATCHES**: Would catch a failed handshake hanging in
/// `Connecting` forever instead of going through the reconnect path.
#[tokio::test]
async fn given_nothing_listening_when_open_then_retries_until_exhausted() {
    // GIVEN: A port with no listener behind it
    let (listener, host) = bind_server().await;
    drop(listener);

    // WHEN: Opening with a small attempt budget
    let session = DebugSession::builder(5u64)
        .with_host(host)
        .with_reconnect_policy(ReconnectPolicy::fixed(FAST_RECONNECT).with_max_attempts(2))
        .open()
        .expect("session should open");

    // THEN: Eventually closed with the terminal error
    let closed = wait_until(|| session.connection_state() == ConnectionState::Closed).await;
    assert!(closed, "session should give up");
    assert!(matches!(
        session.connection_error(),
        Some(StreamError::ReconnectExhausted { attempts: 2, .. })
    ));
}

/// **VALUE**: Verifies binary frames carrying UTF-8 JSON are handled like
/// text and that other binary frames are dropped without harm.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Binary frames being ignored even though the server may send JSON that way
/// - A non-UTF-8 binary frame tearing down the socket or reaching the dispatcher
#[tokio::test]
async fn given_real_server_when_binary_frames_arrive_then_utf8_is_dispatched_and_rest_dropped() {
    // GIVEN: A server sending garbage bytes, then a log as binary, then a log as text
    let (listener, host) = bind_server().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_client(&listener).await;
        ws.send(Message::Binary(vec![0xff, 0xfe, 0x00, 0x9f].into()))
            .await
            .expect("send garbage");
        ws.send(Message::Binary(
            br#"{"type":"log","payload":"sent as binary"}"#.to_vec().into(),
        ))
        .await
        .expect("send binary log");
        ws.send(Message::Text(
            r#"{"type":"log","payload":"sent as text"}"#.into(),
        ))
        .await
        .expect("send text log");
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (log_tx, mut log_rx) = unbounded_channel();
    let session = DebugSession::builder(9u64)
        .with_host(host)
        .on_log(move |log| {
            let _ = log_tx.send(log.message.clone());
        })
        .open()
        .expect("session should open");

    // WHEN: Both decodable frames have arrived
    let mut messages = Vec::new();
    for _ in 0..2 {
        let message = tokio::time::timeout(Duration::from_secs(5), log_rx.recv())
            .await
            .expect("log should arrive")
            .expect("channel open");
        messages.push(message);
    }

    // THEN: Only the UTF-8 frames were dispatched, in order, on one socket
    assert_eq!(messages, vec!["sent as binary", "sent as text"]);
    assert!(session.is_connected());
    assert_eq!(session.reconnect_attempts(), 0);

    drop(session);
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should see the client leave")
        .expect("server task");
}
