use crate::helpers::{MockTransport, TEST_HOST, TEST_TARGET, elapse, settle};

use stream_core::error::{ConfigError, StreamError};
use stream_core::{
    CommandKind, ConnectionState, CoreError, DebugSession, DebugSessionBuilder, InboundEvent,
    ReconnectPolicy,
};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value, json};

const RECONNECT_DELAY: Duration = Duration::from_millis(1_000);

fn builder(transport: &MockTransport, policy: ReconnectPolicy) -> DebugSessionBuilder {
    DebugSession::builder(TEST_TARGET)
        .with_host(TEST_HOST)
        .with_reconnect_policy(policy)
        .with_transport(transport.shared())
}

/// Open a session and complete the handshake on the mock.
async fn connected(transport: &MockTransport, policy: ReconnectPolicy) -> DebugSession {
    let session = builder(transport, policy).open().expect("session should open");
    transport.open_latest();
    settle().await;
    assert!(session.is_connected(), "handshake should complete");
    session
}

fn helpers(session: &DebugSession) -> [(CommandKind, bool); 7] {
    [
        (CommandKind::Continue, session.continue_execution()),
        (CommandKind::Pause, session.pause()),
        (CommandKind::StepOver, session.step_over()),
        (CommandKind::StepInto, session.step_into()),
        (CommandKind::StepOut, session.step_out()),
        (CommandKind::Restart, session.restart()),
        (CommandKind::Stop, session.stop()),
    ]
}

/// **VALUE**: Verifies the endpoint path the session dials.
///
/// **BUG THIS CATCHES**: Would catch the session connecting to a URL the
/// server does not route, which looks exactly like a server outage.
#[tokio::test(start_paused = true)]
async fn given_host_and_target_when_open_then_dials_derived_endpoint() {
    // GIVEN: A mock transport
    let transport = MockTransport::default();

    // WHEN: Opening a session
    let session = builder(&transport, ReconnectPolicy::default())
        .open()
        .expect("session should open");

    // THEN: One socket to the derived URL, state Connecting
    let urls = transport.urls();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].as_str(), "ws://dashboard.test:8080/api/debug/42/ws");
    assert_eq!(session.connection_state(), ConnectionState::Connecting);
    assert_eq!(session.endpoint().url().as_str(), urls[0].as_str());
}

/// **VALUE**: Verifies every command helper refuses to send while the link
/// is not connected.
///
/// **BUG THIS CATCHES**: Would catch a command being buffered and replayed
/// later (a `step_over` executing minutes after the click) or written into a
/// handshaking socket.
#[tokio::test(start_paused = true)]
async fn given_not_connected_when_sending_any_command_then_returns_false() {
    // GIVEN: A built but never connected session
    let transport = MockTransport::default();
    let session = builder(&transport, ReconnectPolicy::default())
        .build()
        .expect("session should build");

    // WHEN / THEN: Every helper reports false while disconnected
    for (kind, sent) in helpers(&session) {
        assert!(!sent, "{kind} should not be sent while disconnected");
    }

    // WHEN / THEN: And while the handshake is still running
    session.connect();
    assert_eq!(session.connection_state(), ConnectionState::Connecting);
    for (kind, sent) in helpers(&session) {
        assert!(!sent, "{kind} should not be sent while connecting");
    }
    assert!(!session.send_json(&json!({"type": "command", "command": "pause"})));

    // THEN: Nothing reached the wire, even after connecting later
    transport.open_latest();
    settle().await;
    assert!(transport.sent().is_empty());
}

/// **VALUE**: Verifies each helper writes the exact envelope for its kind.
///
/// **BUG THIS CATCHES**: Would catch a helper mapped to the wrong command
/// (e.g. `step_into` sending `step_over`) or a drift in the wire format.
#[tokio::test(start_paused = true)]
async fn given_connected_when_sending_each_command_then_writes_exact_envelope() {
    // GIVEN: A connected session
    let transport = MockTransport::default();
    let session = connected(&transport, ReconnectPolicy::default()).await;

    // WHEN: Calling every helper
    let results = helpers(&session);

    // THEN: All accepted, one frame each, in call order
    assert!(results.iter().all(|(_, sent)| *sent));
    let expected: Vec<String> = results
        .iter()
        .map(|(kind, _)| format!(r#"{{"type":"command","command":"{kind}"}}"#))
        .collect();
    assert_eq!(transport.sent(), expected);
}

/// **VALUE**: End-to-end: `pause` before open fails, `continue` after open
/// succeeds with the exact frame.
#[tokio::test(start_paused = true)]
async fn given_pause_before_open_when_continue_after_open_then_only_continue_sent() {
    // GIVEN: A session whose socket has not opened
    let transport = MockTransport::default();
    let session = builder(&transport, ReconnectPolicy::default())
        .open()
        .expect("session should open");

    // WHEN: Pausing too early
    let paused = session.pause();

    // THEN: Refused
    assert!(!paused);

    // WHEN: The socket opens and the consumer continues
    transport.open_latest();
    settle().await;
    let continued = session.continue_execution();

    // THEN: Accepted, and the transport saw exactly the continue frame
    assert!(continued);
    assert_eq!(
        transport.sent(),
        vec![r#"{"type":"command","command":"continue"}"#.to_string()]
    );
}

/// **VALUE**: Verifies params and raw frames go out under the same contract.
#[tokio::test(start_paused = true)]
async fn given_connected_when_sending_params_and_raw_json_then_both_written() {
    // GIVEN: A connected session
    let transport = MockTransport::default();
    let session = connected(&transport, ReconnectPolicy::default()).await;
    let mut params = Map::new();
    params.insert("breakpoints".to_string(), json!(["node-3"]));

    // WHEN: Sending a parameterised command and a raw frame
    let with_params = session.send_with_params(CommandKind::Continue, params);
    let raw = session.send_json(&json!({"type": "subscribe", "channel": "logs"}));

    // THEN: Both written verbatim
    assert!(with_params && raw);
    let sent: Vec<Value> = transport
        .sent()
        .iter()
        .map(|frame| serde_json::from_str(frame).expect("frame should be JSON"))
        .collect();
    assert_eq!(
        sent,
        vec![
            json!({"type": "command", "command": "continue", "params": {"breakpoints": ["node-3"]}}),
            json!({"type": "subscribe", "channel": "logs"}),
        ]
    );
}

/// **VALUE**: End-to-end reconnect on a fixed 1000 ms interval.
///
/// **BUG THIS CATCHES**: Would catch:
/// - Reconnecting before the interval (hammering a restarting server)
/// - Reconnecting twice for one close
/// - `is_connected` reporting true while the link is down
#[tokio::test(start_paused = true)]
async fn given_server_close_when_interval_elapses_then_reconnects_exactly_once() {
    // GIVEN: A connected session counting lifecycle callbacks
    let transport = MockTransport::default();
    let connects = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));
    let (on_connect, on_disconnect) = (Arc::clone(&connects), Arc::clone(&disconnects));
    let session = builder(&transport, ReconnectPolicy::fixed(RECONNECT_DELAY))
        .on_connect(move || {
            on_connect.fetch_add(1, Ordering::SeqCst);
        })
        .on_disconnect(move |_| {
            on_disconnect.fetch_add(1, Ordering::SeqCst);
        })
        .open()
        .expect("session should open");
    transport.open_latest();
    settle().await;
    assert!(session.is_connected());

    // WHEN: The server closes the socket
    transport.server_close(1012, "service restart");
    settle().await;

    // THEN: Down, one timer pending, no reopen yet
    assert!(!session.is_connected());
    assert_eq!(session.connection_state(), ConnectionState::ReconnectScheduled);
    assert!(session.has_pending_reconnect());
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);

    // WHEN: Almost the whole interval passes
    elapse(RECONNECT_DELAY - Duration::from_millis(1)).await;

    // THEN: Still only the original socket
    assert_eq!(transport.opens(), 1);
    assert!(!session.is_connected());

    // WHEN: The interval completes and the server accepts again
    elapse(Duration::from_millis(1)).await;
    assert_eq!(transport.opens(), 2);
    assert!(!session.is_connected(), "not connected until the handshake completes");
    transport.open_latest();
    settle().await;

    // THEN: Connected again, exactly one reopen, counter reset
    assert!(session.is_connected());
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    assert_eq!(session.reconnect_attempts(), 0);

    // THEN: Nothing else is scheduled
    elapse(RECONNECT_DELAY * 5).await;
    assert_eq!(transport.opens(), 2);
    assert_eq!(transport.max_live(), 1);
}

/// **VALUE**: Verifies `disconnect()` cancels a scheduled reconnect.
///
/// **BUG THIS CATCHES**: Would catch a closed debug panel reopening its
/// socket in the background a few seconds later.
#[tokio::test(start_paused = true)]
async fn given_reconnect_scheduled_when_disconnect_then_never_reopens() {
    // GIVEN: A session waiting to reconnect
    let transport = MockTransport::default();
    let session = connected(&transport, ReconnectPolicy::fixed(RECONNECT_DELAY)).await;
    transport.server_close(1006, "network lost");
    settle().await;
    assert!(session.has_pending_reconnect());

    // WHEN: The consumer disconnects and time passes
    session.disconnect();
    elapse(RECONNECT_DELAY * 10).await;

    // THEN: No reopen, terminal state
    assert_eq!(transport.opens(), 1);
    assert_eq!(session.connection_state(), ConnectionState::Closed);
    assert!(!session.has_pending_reconnect());
    assert!(!session.continue_execution());
}

/// **VALUE**: Verifies frames reach the consumer in wire order across types.
#[tokio::test(start_paused = true)]
async fn given_log_state_log_frames_when_received_then_delivered_in_order() {
    // GIVEN: A connected session recording log and state events
    let transport = MockTransport::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (logs, states) = (Arc::clone(&seen), Arc::clone(&seen));
    let session = builder(&transport, ReconnectPolicy::default())
        .on_log(move |log| logs.lock().unwrap().push(format!("log:{}", log.message)))
        .on_state_change(move |change| {
            states
                .lock()
                .unwrap()
                .push(format!("state:{}", change.state))
        })
        .open()
        .expect("session should open");
    transport.open_latest();
    settle().await;

    // WHEN: The server pushes log, state_change, log
    transport.push(r#"{"type":"log","payload":"building"}"#);
    transport.push(r#"{"type":"state_change","payload":{"state":"paused"}}"#);
    transport.push(r#"{"type":"log","payload":{"message":"hit breakpoint","level":"debug"}}"#);
    settle().await;

    // THEN: Same order at the consumer
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["log:building", "state:paused", "log:hit breakpoint"]
    );
    assert!(matches!(session.last_event(), Some(InboundEvent::Log(_))));
}

/// **VALUE**: Verifies an unknown frame type is dropped without side effects.
///
/// **BUG THIS CATCHES**: Would catch a server keep-alive reaching consumer
/// callbacks or tearing down the pump so later frames are lost.
#[tokio::test(start_paused = true)]
async fn given_ping_frame_when_received_then_dropped_and_pipeline_survives() {
    // GIVEN: A connected session counting every callback
    let transport = MockTransport::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let (a, b, c, d) = (
        Arc::clone(&calls),
        Arc::clone(&calls),
        Arc::clone(&calls),
        Arc::clone(&calls),
    );
    let session = builder(&transport, ReconnectPolicy::default())
        .on_log(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        })
        .on_variables(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        })
        .on_state_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .on_error(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        })
        .open()
        .expect("session should open");
    transport.open_latest();
    settle().await;

    // WHEN: A ping and some garbage arrive
    transport.push(r#"{"type":"ping"}"#);
    transport.push("<html>502 Bad Gateway</html>");
    settle().await;

    // THEN: No callback, still connected
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(session.is_connected());

    // WHEN: A real frame follows
    transport.push(r#"{"type":"variables","payload":{"i":3}}"#);
    settle().await;

    // THEN: Delivered
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// **VALUE**: Verifies `max_attempts` ends retries with a terminal error.
#[tokio::test(start_paused = true)]
async fn given_max_attempts_when_server_stays_down_then_closed_with_exhausted_error() {
    // GIVEN: A connected session allowing three reconnect attempts
    let transport = MockTransport::default();
    let policy = ReconnectPolicy::fixed(RECONNECT_DELAY).with_max_attempts(3);
    let session = connected(&transport, policy).await;

    // WHEN: The server goes away for good
    transport.refuse_opens();
    transport.server_close(1001, "going away");
    settle().await;
    for _ in 0..6 {
        elapse(RECONNECT_DELAY).await;
    }

    // THEN: Closed with the terminal error, nothing pending
    assert_eq!(session.connection_state(), ConnectionState::Closed);
    assert!(!session.has_pending_reconnect());
    let error = session.connection_error().expect("error should be recorded");
    assert!(error.is_terminal());
    assert!(matches!(
        error,
        StreamError::ReconnectExhausted { attempts: 3, .. }
    ));
}

/// **VALUE**: Verifies a disabled policy leaves the session disconnected.
#[tokio::test(start_paused = true)]
async fn given_reconnect_disabled_when_server_closes_then_disconnected_until_manual_reconnect() {
    // GIVEN: A connected session with reconnection disabled
    let transport = MockTransport::default();
    let session = connected(&transport, ReconnectPolicy::disabled()).await;

    // WHEN: The server closes and a long time passes
    transport.server_close(1000, "done");
    settle().await;
    elapse(Duration::from_secs(60)).await;

    // THEN: Disconnected, nothing scheduled
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(!session.has_pending_reconnect());
    assert_eq!(transport.opens(), 1);

    // WHEN: The consumer reconnects by hand
    session.reconnect();
    transport.open_latest();
    settle().await;

    // THEN: Connected on a second socket
    assert!(session.is_connected());
    assert_eq!(transport.opens(), 2);
}

/// **VALUE**: Verifies a manual reconnect preempts the pending timer.
#[tokio::test(start_paused = true)]
async fn given_reconnect_scheduled_when_manual_reconnect_then_single_socket() {
    // GIVEN: A session waiting to reconnect
    let transport = MockTransport::default();
    let session = connected(&transport, ReconnectPolicy::fixed(RECONNECT_DELAY)).await;
    transport.server_close(1006, "network lost");
    settle().await;

    // WHEN: Reconnecting immediately, then letting the old deadline pass
    session.reconnect();
    elapse(RECONNECT_DELAY * 3).await;

    // THEN: Exactly one extra socket
    assert_eq!(transport.opens(), 2);
    assert_eq!(transport.max_live(), 1);
    assert_eq!(session.connection_state(), ConnectionState::Connecting);
}

/// **VALUE**: Verifies the one-socket one-timer invariants under churn.
///
/// **BUG THIS CATCHES**: Would catch leaked sockets or stacked timers when
/// closes, manual reconnects and timer firings interleave.
#[tokio::test(start_paused = true)]
async fn given_repeated_drops_and_reconnects_then_never_two_sockets() {
    // GIVEN: A connected session
    let transport = MockTransport::default();
    let session = connected(&transport, ReconnectPolicy::fixed(RECONNECT_DELAY)).await;

    // WHEN: Many rounds of close, partial wait, manual reconnect, close, full wait
    for _ in 0..5 {
        transport.server_close(1006, "blip");
        settle().await;
        elapse(RECONNECT_DELAY / 2).await;
        session.reconnect();
        session.connect();
        transport.open_latest();
        settle().await;
        transport.server_close(1006, "blip");
        settle().await;
        elapse(RECONNECT_DELAY).await;
        transport.open_latest();
        settle().await;
    }

    // THEN: Never more than one live socket, and connected at the end
    assert_eq!(transport.max_live(), 1);
    assert_eq!(transport.live(), 1);
    assert!(session.is_connected());
    assert!(!session.has_pending_reconnect());
}

/// **VALUE**: Verifies dropping the session closes its socket exactly once
/// and reports no disconnect to the consumer.
#[tokio::test(start_paused = true)]
async fn given_connected_session_when_dropped_then_socket_closed() {
    // GIVEN: A connected session counting disconnect callbacks
    let transport = MockTransport::default();
    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disconnects);
    let session = builder(&transport, ReconnectPolicy::fixed(RECONNECT_DELAY))
        .on_disconnect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .open()
        .expect("session should open");
    transport.open_latest();
    settle().await;
    assert_eq!(transport.live(), 1);

    // WHEN: Dropping it, then letting time pass
    drop(session);
    elapse(RECONNECT_DELAY * 5).await;

    // THEN: Socket closed, no reopen, no disconnect callback
    assert_eq!(transport.live(), 0);
    assert_eq!(transport.opens(), 1);
    assert_eq!(disconnects.load(Ordering::SeqCst), 0);
}

/// **VALUE**: Verifies a refused open is surfaced and retried.
#[tokio::test(start_paused = true)]
async fn given_transport_refuses_when_open_then_error_recorded_and_retry_scheduled() {
    // GIVEN: A transport that refuses to open
    let transport = MockTransport::default();
    transport.refuse_opens();

    // WHEN: Opening a session
    let session = builder(&transport, ReconnectPolicy::fixed(RECONNECT_DELAY))
        .open()
        .expect("construction should still succeed");

    // THEN: Not connected, error recorded, one timer pending
    assert!(!session.is_connected());
    assert!(matches!(
        session.connection_error(),
        Some(StreamError::TransportOpen { .. })
    ));
    assert_eq!(session.connection_state(), ConnectionState::ReconnectScheduled);
    assert_eq!(session.reconnect_attempts(), 1);
}

/// **VALUE**: Verifies construction errors are reported before any I/O.
#[tokio::test]
async fn given_invalid_settings_when_build_then_construction_error() {
    // GIVEN / WHEN / THEN: No host or base URL
    let transport = MockTransport::default();
    let missing_host = DebugSession::builder(TEST_TARGET)
        .with_transport(transport.shared())
        .build();
    assert!(matches!(missing_host, Err(CoreError::Model(_))));

    // GIVEN / WHEN / THEN: A feature segment with a slash
    let bad_feature = builder(&transport, ReconnectPolicy::default())
        .with_feature("debug/extra")
        .build();
    assert!(matches!(bad_feature, Err(CoreError::Model(_))));

    // GIVEN / WHEN / THEN: A reconnect delay below the floor
    let bad_policy = builder(&transport, ReconnectPolicy::fixed(Duration::from_millis(1))).build();
    assert!(matches!(
        bad_policy,
        Err(CoreError::Config(ConfigError::ValidationError { .. }))
    ));

    // THEN: No socket was opened for any of them
    assert_eq!(transport.opens(), 0);
}

/// **VALUE**: Verifies `build()` outside a runtime fails instead of panicking.
#[test]
fn given_no_runtime_when_build_then_stream_runtime_error() {
    // GIVEN: A plain thread with no tokio runtime
    let transport = MockTransport::default();

    // WHEN: Building
    let result = builder(&transport, ReconnectPolicy::default()).build();

    // THEN: Runtime error
    assert!(matches!(
        result,
        Err(CoreError::Stream(StreamError::Runtime { .. }))
    ));
}
