use crate::config::ReconnectPolicy;
use crate::error::stream::StreamError;
use crate::lifecycle::{LifecycleManager, LinkEvent, Notice};
use crate::tests::support::RecordingTransport;
use crate::transport::{CloseInfo, TransportEvent};

use models::{ConnectionState, EndpointBuilder};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

const DELAY: Duration = Duration::from_millis(1_000);

fn manager(
    policy: ReconnectPolicy,
) -> (
    LifecycleManager,
    UnboundedReceiver<LinkEvent>,
    RecordingTransport,
) {
    let endpoint = EndpointBuilder::default()
        .with_host("localhost:9")
        .with_feature("debug")
        .with_target(1u64)
        .build()
        .expect("endpoint should build");
    let transport = RecordingTransport::default();
    let (manager, events) = LifecycleManager::new(
        endpoint,
        policy,
        Arc::new(transport.clone()),
        Handle::current(),
        "test".to_string(),
    );
    (manager, events, transport)
}

/// Apply everything queued so far, the way the session's pump would.
fn drain(manager: &LifecycleManager, events: &mut UnboundedReceiver<LinkEvent>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Some(delivery) = manager.handle_event(event) {
            notices.push(delivery.notice);
        }
    }
    notices
}

/// Let spawned timer tasks run after the paused clock moved.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

async fn elapse(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

fn server_close() -> TransportEvent {
    TransportEvent::Close(CloseInfo::new(1001, "server restart"))
}

/// **VALUE**: Verifies `connect()` is idempotent while a socket exists.
///
/// **BUG THIS CATCHES**: Would catch a second socket being opened for the
/// same session when a consumer calls `connect()` twice in a row, leaving
/// two live sockets that both deliver every frame.
#[tokio::test(start_paused = true)]
async fn given_connecting_when_connect_called_again_then_opens_one_socket() {
    // GIVEN: A manager that has started connecting
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();

    // WHEN: Connecting again, before and after the open event
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    drain(&manager, &mut events);
    manager.connect();

    // THEN: Exactly one socket was ever opened
    assert_eq!(transport.opens(), 1);
    assert_eq!(transport.live(), 1);
    assert_eq!(manager.state(), ConnectionState::Connected);
}

/// **VALUE**: Verifies the open event completes the handshake.
///
/// **BUG THIS CATCHES**: Would catch the attempt counter or the last error
/// surviving a successful open, which would make a later outage give up
/// too early or show a stale error.
#[tokio::test(start_paused = true)]
async fn given_reconnecting_when_socket_opens_then_resets_attempts_and_error() {
    // GIVEN: A first open that failed synchronously and was rescheduled
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    transport.fail_next_opens(1);
    manager.connect();
    assert_eq!(manager.attempts(), 1);
    assert!(matches!(
        manager.last_error(),
        Some(StreamError::TransportOpen { .. })
    ));

    // WHEN: The timer fires and the retry opens
    elapse(DELAY).await;
    drain(&manager, &mut events);
    transport.last_sink().emit(TransportEvent::Open);
    let notices = drain(&manager, &mut events);

    // THEN: Connected with a clean slate
    assert_eq!(notices, vec![Notice::Connected]);
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.attempts(), 0);
    assert!(manager.last_error().is_none());
}

/// **VALUE**: Verifies an unplanned close schedules exactly one timer.
///
/// **BUG THIS CATCHES**: Would catch:
/// - The close not being reported to the consumer
/// - The socket handle surviving the close
/// - A reconnect happening immediately instead of after the delay
#[tokio::test(start_paused = true)]
async fn given_connected_when_server_closes_then_schedules_one_reconnect() {
    // GIVEN: A connected link
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    drain(&manager, &mut events);

    // WHEN: The server closes the socket
    transport.last_sink().emit(server_close());
    let notices = drain(&manager, &mut events);

    // THEN: Disconnected notice, timer pending, no socket yet
    assert_eq!(
        notices,
        vec![Notice::Disconnected(CloseInfo::new(1001, "server restart"))]
    );
    assert_eq!(manager.state(), ConnectionState::ReconnectScheduled);
    assert!(manager.has_pending_timer());
    assert_eq!(manager.attempts(), 1);
    assert_eq!(transport.live(), 0);
    assert!(manager.live_socket().is_none());
}

/// **VALUE**: Verifies the reconnect fires after the configured delay, once.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one in the timer deadline or
/// a second timer doubling the reconnect.
#[tokio::test(start_paused = true)]
async fn given_reconnect_scheduled_when_delay_elapses_then_reopens_once() {
    // GIVEN: A link that was closed by the server
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    transport.last_sink().emit(server_close());
    drain(&manager, &mut events);

    // WHEN: Just short of the delay
    elapse(DELAY - Duration::from_millis(1)).await;
    drain(&manager, &mut events);

    // THEN: Still waiting
    assert_eq!(transport.opens(), 1);

    // WHEN: The delay completes
    elapse(Duration::from_millis(1)).await;
    drain(&manager, &mut events);

    // THEN: One new socket, never two at once
    assert_eq!(transport.opens(), 2);
    assert_eq!(transport.max_live(), 1);
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert!(!manager.has_pending_timer());
}

/// **VALUE**: Verifies `disconnect()` wins over a timer firing that is
/// already queued.
///
/// **BUG THIS CATCHES**: Would catch the classic teardown race where the
/// timer fired just before `disconnect()` and its queued event then reopens
/// a socket for a session the consumer already closed.
#[tokio::test(start_paused = true)]
async fn given_timer_fired_but_unprocessed_when_disconnect_then_does_not_reopen() {
    // GIVEN: A scheduled reconnect whose timer has already fired
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    transport.last_sink().emit(server_close());
    drain(&manager, &mut events);
    elapse(DELAY).await;

    // WHEN: Disconnecting before the pump sees the firing
    manager.disconnect();
    drain(&manager, &mut events);
    elapse(DELAY * 10).await;
    drain(&manager, &mut events);

    // THEN: No reopen, terminal state
    assert_eq!(transport.opens(), 1);
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(!manager.has_pending_timer());
}

/// **VALUE**: Verifies events from a replaced socket are ignored.
///
/// **BUG THIS CATCHES**: Would catch a late close from the previous socket
/// tearing down (or scheduling a reconnect over) the socket that replaced it.
#[tokio::test(start_paused = true)]
async fn given_replaced_socket_when_it_reports_close_then_ignored() {
    // GIVEN: First socket closed, then a manual connect opened a second one
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    let first = transport.last_sink();
    first.emit(TransportEvent::Open);
    first.emit(server_close());
    drain(&manager, &mut events);
    manager.connect();
    let second = manager.live_socket();

    // WHEN: The first socket reports more events
    first.emit(TransportEvent::Message("{\"type\":\"log\",\"payload\":\"late\"}".into()));
    first.emit(server_close());
    let notices = drain(&manager, &mut events);

    // THEN: Nothing changes for the second socket
    assert!(notices.is_empty());
    assert_eq!(manager.live_socket(), second);
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert!(!manager.has_pending_timer());
}

/// **VALUE**: Verifies a timer id that is no longer pending is ignored.
#[tokio::test(start_paused = true)]
async fn given_unknown_timer_id_when_handled_then_ignored() {
    // GIVEN: A scheduled reconnect
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(server_close());
    drain(&manager, &mut events);

    // WHEN: A firing with a foreign timer id arrives
    let notice = manager.handle_event(LinkEvent::ReconnectDue { timer: 9_999 });

    // THEN: No reopen and the real timer is still pending
    assert!(notice.is_none());
    assert_eq!(transport.opens(), 1);
    assert!(manager.has_pending_timer());
}

/// **VALUE**: Verifies the attempt budget ends in a terminal error.
///
/// **BUG THIS CATCHES**: Would catch retrying forever (or one time too
/// many) when `max_attempts` is configured.
#[tokio::test(start_paused = true)]
async fn given_max_attempts_when_all_fail_then_closed_with_exhausted_error() {
    // GIVEN: Two attempts allowed and a transport that always refuses
    let policy = ReconnectPolicy::fixed(DELAY).with_max_attempts(2);
    let (manager, mut events, transport) = manager(policy);
    transport.fail_next_opens(usize::MAX);

    // WHEN: Connecting and letting every retry run
    manager.connect();
    for _ in 0..4 {
        elapse(DELAY).await;
        drain(&manager, &mut events);
    }

    // THEN: Closed after exactly two retries
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(!manager.has_pending_timer());
    match manager.last_error() {
        Some(StreamError::ReconnectExhausted { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("Expected ReconnectExhausted, got {other:?}"),
    }
}

/// **VALUE**: Verifies a disabled policy never schedules a timer.
#[tokio::test(start_paused = true)]
async fn given_reconnect_disabled_when_server_closes_then_stays_disconnected() {
    // GIVEN: Connected with reconnection disabled
    let (manager, mut events, transport) = manager(ReconnectPolicy::disabled());
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    drain(&manager, &mut events);

    // WHEN: The server closes
    transport.last_sink().emit(server_close());
    drain(&manager, &mut events);
    elapse(Duration::from_secs(60)).await;
    drain(&manager, &mut events);

    // THEN: Disconnected, no retry
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(!manager.has_pending_timer());
    assert_eq!(transport.opens(), 1);
}

/// **VALUE**: Verifies writes are refused until the link is connected.
///
/// **BUG THIS CATCHES**: Would catch frames being written into a socket that
/// is still handshaking, where the server would never see them.
#[tokio::test(start_paused = true)]
async fn given_connecting_when_write_text_then_refused_until_open() {
    // GIVEN: A socket that has not opened yet
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    assert!(!manager.write_text("early".into()));
    manager.connect();

    // WHEN / THEN: Refused while connecting
    assert!(!manager.write_text("connecting".into()));

    // WHEN / THEN: Accepted once open
    transport.last_sink().emit(TransportEvent::Open);
    drain(&manager, &mut events);
    assert!(manager.write_text("open".into()));
    assert_eq!(transport.sent(), vec!["open".to_string()]);
}

/// **VALUE**: Verifies a transport error is recorded without forcing a close.
#[tokio::test(start_paused = true)]
async fn given_connected_when_transport_error_then_recorded_and_still_connected() {
    // GIVEN: Connected
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    drain(&manager, &mut events);

    // WHEN: The socket reports an error
    transport
        .last_sink()
        .emit(TransportEvent::Error("broken pipe".into()));
    drain(&manager, &mut events);

    // THEN: Error surfaced, link untouched until a close arrives
    assert_eq!(manager.state(), ConnectionState::Connected);
    match manager.last_error() {
        Some(StreamError::Transport { message, .. }) => assert_eq!(message, "broken pipe"),
        other => panic!("Expected Transport error, got {other:?}"),
    }
}

/// **VALUE**: Verifies `disconnect()` is idempotent and closes the socket once.
#[tokio::test(start_paused = true)]
async fn given_connected_when_disconnect_twice_then_socket_closed_once() {
    // GIVEN: Connected
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    drain(&manager, &mut events);

    // WHEN: Disconnecting twice
    manager.disconnect();
    manager.disconnect();

    // THEN: One close, terminal state, writes refused
    assert_eq!(transport.closed().len(), 1);
    assert_eq!(transport.live(), 0);
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(!manager.write_text("after".into()));
}

/// **VALUE**: Verifies a manual reconnect replaces the pending timer.
///
/// **BUG THIS CATCHES**: Would catch the old timer surviving a manual
/// reconnect and opening a second socket when it fires.
#[tokio::test(start_paused = true)]
async fn given_reconnect_scheduled_when_manual_reconnect_then_timer_cancelled() {
    // GIVEN: A scheduled reconnect
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(server_close());
    drain(&manager, &mut events);
    assert!(manager.has_pending_timer());

    // WHEN: Reconnecting by hand, then letting the old deadline pass
    manager.reconnect();
    elapse(DELAY * 2).await;
    drain(&manager, &mut events);

    // THEN: Exactly the manual socket was opened
    assert_eq!(transport.opens(), 2);
    assert_eq!(transport.max_live(), 1);
    assert_eq!(manager.attempts(), 0);
    assert_eq!(manager.state(), ConnectionState::Connecting);
}

/// **VALUE**: Verifies a notice decided before `disconnect()` is never delivered.
///
/// **BUG THIS CATCHES**: Would catch `on_connect` (or a frame handler)
/// firing after `disconnect()` returned, when another thread disconnects
/// between the pump applying the open event and running the callback.
#[tokio::test(start_paused = true)]
async fn given_open_applied_when_disconnect_runs_before_delivery_then_callback_skipped() {
    // GIVEN: An open event applied but not yet delivered
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    let event = events.try_recv().expect("open event should be queued");
    let delivery = manager.handle_event(event).expect("open should produce a notice");
    assert_eq!(delivery.notice, Notice::Connected);

    // WHEN: Disconnecting in between, then delivering
    manager.disconnect();
    let mut called = false;
    let delivered = manager.deliver(delivery, |_| called = true);

    // THEN: The callback never ran
    assert!(!delivered);
    assert!(!called);
    assert_eq!(manager.state(), ConnectionState::Closed);
}

/// **VALUE**: Verifies notices after a fresh `connect()` are delivered again.
#[tokio::test(start_paused = true)]
async fn given_disconnected_when_connected_again_then_new_notices_delivered() {
    // GIVEN: A session that was disconnected and connected again
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    manager.disconnect();
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);

    // WHEN: Delivering the open of the new socket
    let event = events.try_recv().expect("open event should be queued");
    let delivery = manager.handle_event(event).expect("open should produce a notice");
    let mut seen = Vec::new();
    let delivered = manager.deliver(delivery, |notice| seen.push(notice));

    // THEN: Delivered as usual
    assert!(delivered);
    assert_eq!(seen, vec![Notice::Connected]);
}

/// **VALUE**: Verifies a callback may disconnect its own session.
///
/// **BUG THIS CATCHES**: Would catch `disconnect()` waiting on the delivery
/// gate held by the callback that called it, hanging the pump forever.
#[tokio::test(start_paused = true)]
async fn given_callback_running_when_it_disconnects_then_does_not_deadlock() {
    // GIVEN: A pending Connected notice
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    let event = events.try_recv().expect("open event should be queued");
    let delivery = manager.handle_event(event).expect("open should produce a notice");

    // WHEN: The callback disconnects
    let delivered = manager.deliver(delivery, |_| manager.disconnect());

    // THEN: It returns and the link is closed
    assert!(delivered);
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(transport.live(), 0);
}

/// **VALUE**: Verifies `disconnect()` from another thread waits for a
/// callback that is already running.
///
/// **BUG THIS CATCHES**: Would catch `disconnect()` returning while the
/// pump thread is still inside a callback, so output appears after the
/// consumer believes the session is closed.
#[tokio::test]
async fn given_callback_in_progress_when_other_thread_disconnects_then_waits_for_it() {
    // GIVEN: A delivery running on another thread
    let (manager, mut events, transport) = manager(ReconnectPolicy::fixed(DELAY));
    manager.connect();
    transport.last_sink().emit(TransportEvent::Open);
    let event = events.try_recv().expect("open event should be queued");
    let delivery = manager.handle_event(event).expect("open should produce a notice");

    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let finished = Arc::new(AtomicBool::new(false));
    let pump = {
        let manager = manager.clone();
        let finished = Arc::clone(&finished);
        std::thread::spawn(move || {
            manager.deliver(delivery, |_| {
                entered_tx.send(()).expect("test thread should be listening");
                std::thread::sleep(Duration::from_millis(50));
                finished.store(true, Ordering::SeqCst);
            })
        })
    };
    entered_rx.recv().expect("callback should start");

    // WHEN: Disconnecting from this thread
    manager.disconnect();

    // THEN: The callback had completed before disconnect returned
    assert!(finished.load(Ordering::SeqCst));
    assert!(pump.join().expect("delivery thread should not panic"));
    assert_eq!(manager.state(), ConnectionState::Closed);
}
