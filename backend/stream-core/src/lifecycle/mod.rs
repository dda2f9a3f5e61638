//! Connection lifecycle manager.
//!
//! Owns the session's one live socket and its one pending reconnect timer,
//! tracks [`ConnectionState`], and applies the [`ReconnectPolicy`] whenever a
//! socket closes.
//!
//! # Serialization
//!
//! All state lives behind a single mutex. Transport events and timer
//! firings arrive through one queue and are applied by the session's event
//! pump one at a time, in arrival order; the synchronous entry points
//! (`connect`, `disconnect`, `reconnect`, `write_text`) take the same lock.
//! Every transition therefore completes before the next one starts, which
//! is what keeps the "one socket, one timer" invariants.
//!
//! # Staleness
//!
//! Sockets carry a generation id and timers a timer id. Replacing a socket
//! or cancelling a timer bumps the live id, so an event that was already in
//! flight for the old one is recognised and dropped instead of acting on the
//! new state.
//!
//! # Delivery
//!
//! Applying an event and running the consumer's callback for it are two
//! steps. Each [`Delivery`] is stamped with the disconnect epoch it was
//! decided in, and [`deliver`](LifecycleManager::deliver) holds the delivery
//! gate while it re-checks the epoch and runs the callback. `disconnect`
//! takes the same gate, so once it returns no callback is running and none
//! decided earlier will start.

mod link;

use crate::config::ReconnectPolicy;
use crate::error::stream::StreamError;
use crate::transport::{CloseInfo, EventSink, SocketId, Transport, TransportEvent};

use link::{LinkState, LiveSocket, PendingTimer};

use common::ErrorLocation;
use models::{ConnectionState, Endpoint};

use std::cell::Cell;
use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, trace, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Instant, sleep_until};

/// Everything the event pump consumes.
#[derive(Debug)]
pub(crate) enum LinkEvent {
    Transport {
        socket: SocketId,
        event: TransportEvent,
    },
    ReconnectDue {
        timer: u64,
    },
}

/// What the pump should tell the consumer after an event was applied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Notice {
    Connected,
    Disconnected(CloseInfo),
    Frame(String),
}

/// A notice together with the disconnect epoch it was decided in.
#[derive(Debug)]
pub(crate) struct Delivery {
    pub(crate) notice: Notice,
    epoch: u64,
}

thread_local! {
    /// Set while this thread runs a consumer callback under the gate.
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

struct DeliveringFlag;

impl DeliveringFlag {
    fn raise() -> Self {
        DELIVERING.with(|flag| flag.set(true));
        Self
    }
}

impl Drop for DeliveringFlag {
    fn drop(&mut self) {
        DELIVERING.with(|flag| flag.set(false));
    }
}

struct Shared {
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    transport: Arc<dyn Transport>,
    events: UnboundedSender<LinkEvent>,
    runtime: Handle,
    label: String,
    gate: Mutex<()>,
}

#[derive(Clone)]
pub(crate) struct LifecycleManager {
    link: Arc<Mutex<LinkState>>,
    shared: Arc<Shared>,
}

impl LifecycleManager {
    /// Create a manager in the `Disconnected` state.
    ///
    /// The returned receiver carries every event the manager must see; the
    /// caller feeds each one back through [`handle_event`](Self::handle_event).
    pub(crate) fn new(
        endpoint: Endpoint,
        policy: ReconnectPolicy,
        transport: Arc<dyn Transport>,
        runtime: Handle,
        label: String,
    ) -> (Self, UnboundedReceiver<LinkEvent>) {
        let (events, receiver) = unbounded_channel();
        let manager = Self {
            link: Arc::new(Mutex::new(LinkState::default())),
            shared: Arc::new(Shared {
                endpoint,
                policy,
                transport,
                events,
                runtime,
                label,
                gate: Mutex::new(()),
            }),
        };
        (manager, receiver)
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialize with an in-flight delivery.
    ///
    /// A callback calling back into the manager already holds the gate on
    /// this thread and must not wait for itself.
    fn gate(&self) -> Option<MutexGuard<'_, ()>> {
        if DELIVERING.with(Cell::get) {
            return None;
        }
        Some(self.shared.gate.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn label(&self) -> &str {
        &self.shared.label
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    pub(crate) fn policy(&self) -> &ReconnectPolicy {
        &self.shared.policy
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub(crate) fn last_error(&self) -> Option<StreamError> {
        self.lock().last_error.clone()
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    pub(crate) fn has_pending_timer(&self) -> bool {
        self.lock().timer.is_some()
    }

    #[cfg(test)]
    pub(crate) fn live_socket(&self) -> Option<SocketId> {
        self.lock().socket.as_ref().map(|socket| socket.id)
    }

    // ============================================
    // COMMANDS FROM THE FACADE
    // ============================================

    /// Open a socket unless one is already connecting or connected.
    ///
    /// A manual connect starts a fresh reconnect budget.
    pub(crate) fn connect(&self) {
        let mut link = self.lock();
        if link.state.has_live_socket() {
            trace!("[{}] connect() ignored: already {}", self.label(), link.state);
            return;
        }
        link.attempts = 0;
        self.open_locked(&mut link);
    }

    /// Cancel the pending timer, then connect.
    pub(crate) fn reconnect(&self) {
        let mut link = self.lock();
        if link.cancel_timer() {
            debug!("[{}] Pending reconnect cancelled by manual reconnect", self.label());
        }
        if link.state.has_live_socket() {
            trace!("[{}] reconnect() found link already {}", self.label(), link.state);
            return;
        }
        link.attempts = 0;
        self.open_locked(&mut link);
    }

    /// Terminal close. Idempotent.
    ///
    /// The timer is cancelled before the socket is closed so that no
    /// reconnect can be scheduled or fire in between.
    pub(crate) fn disconnect(&self) {
        let _gate = self.gate();
        let mut link = self.lock();
        link.epoch += 1;
        link.cancel_timer();
        if let Some(mut socket) = link.socket.take() {
            socket.handle.close();
        }
        if link.state != ConnectionState::Closed {
            info!("[{}] Disconnected by request", self.label());
            link.state = ConnectionState::Closed;
        }
    }

    /// Write a text frame on the live socket.
    ///
    /// Returns `false` without writing unless the link is `Connected`.
    pub(crate) fn write_text(&self, text: String) -> bool {
        let mut link = self.lock();
        if link.state != ConnectionState::Connected {
            return false;
        }
        match link.socket.as_mut() {
            Some(socket) => socket.handle.send_text(text),
            None => false,
        }
    }

    // ============================================
    // EVENTS FROM TRANSPORT AND TIMER
    // ============================================

    pub(crate) fn handle_event(&self, event: LinkEvent) -> Option<Delivery> {
        let mut link = self.lock();
        let notice = self.apply(&mut link, event)?;
        Some(Delivery {
            notice,
            epoch: link.epoch,
        })
    }

    /// Hand a notice to `consume` unless a disconnect happened since it was
    /// decided. Returns whether `consume` ran.
    pub(crate) fn deliver(&self, delivery: Delivery, consume: impl FnOnce(Notice)) -> bool {
        let _gate = self.gate();
        if self.lock().epoch != delivery.epoch {
            debug!(
                "[{}] Dropping {:?} decided before disconnect",
                self.label(),
                delivery.notice
            );
            return false;
        }
        let _delivering = DeliveringFlag::raise();
        consume(delivery.notice);
        true
    }

    fn apply(&self, link: &mut LinkState, event: LinkEvent) -> Option<Notice> {
        match event {
            LinkEvent::ReconnectDue { timer } => {
                self.on_timer(link, timer);
                None
            }
            LinkEvent::Transport { socket, event } => {
                if link.socket.as_ref().map(|live| live.id) != Some(socket) {
                    trace!(
                        "[{}] Ignoring {:?} from stale socket #{}",
                        self.label(),
                        event,
                        socket
                    );
                    return None;
                }
                match event {
                    TransportEvent::Open => self.on_open(link),
                    TransportEvent::Message(text) => {
                        (link.state == ConnectionState::Connected).then_some(Notice::Frame(text))
                    }
                    TransportEvent::Error(message) => {
                        self.on_error(link, message);
                        None
                    }
                    TransportEvent::Close(info) => Some(self.on_close(link, info)),
                }
            }
        }
    }

    fn on_open(&self, link: &mut LinkState) -> Option<Notice> {
        if link.state != ConnectionState::Connecting {
            return None;
        }
        info!("[{}] Connected to {}", self.label(), self.shared.endpoint);
        link.state = ConnectionState::Connected;
        link.attempts = 0;
        link.last_error = None;
        Some(Notice::Connected)
    }

    #[track_caller]
    fn on_error(&self, link: &mut LinkState, message: String) {
        warn!("[{}] Transport error: {}", self.label(), message);
        link.last_error = Some(StreamError::Transport {
            message,
            location: ErrorLocation::from(Location::caller()),
        });
    }

    fn on_close(&self, link: &mut LinkState, info: CloseInfo) -> Notice {
        info!(
            "[{}] Socket closed (code {:?}, reason '{}')",
            self.label(),
            info.code,
            info.reason
        );
        if let Some(mut socket) = link.socket.take() {
            socket.handle.close();
        }
        self.schedule_reconnect_locked(link);
        Notice::Disconnected(info)
    }

    fn on_timer(&self, link: &mut LinkState, timer: u64) {
        let due = link.timer.as_ref().map(|pending| pending.id) == Some(timer)
            && link.state == ConnectionState::ReconnectScheduled;
        if !due {
            debug!("[{}] Ignoring stale reconnect timer #{}", self.label(), timer);
            return;
        }
        link.timer = None;
        info!(
            "[{}] Reconnect attempt {} to {}",
            self.label(),
            link.attempts,
            self.shared.endpoint
        );
        self.open_locked(link);
    }

    // ============================================
    // TRANSITIONS
    // ============================================

    /// Replace whatever socket exists with a new one and enter `Connecting`.
    ///
    /// A transport that refuses to open is treated like an immediate close.
    fn open_locked(&self, link: &mut LinkState) {
        link.cancel_timer();
        if let Some(mut previous) = link.socket.take() {
            debug!("[{}] Closing superseded socket #{}", self.label(), previous.id);
            previous.handle.close();
        }

        let id = link.next_socket_id();
        let sink = EventSink::new(id, self.shared.events.clone());
        link.state = ConnectionState::Connecting;
        debug!("[{}] Opening socket #{} to {}", self.label(), id, self.shared.endpoint);

        match self.shared.transport.open(self.shared.endpoint.url(), sink) {
            Ok(handle) => link.socket = Some(LiveSocket { id, handle }),
            Err(e) => {
                warn!("[{}] Failed to open socket: {}", self.label(), e);
                link.last_error = Some(StreamError::from(e));
                self.schedule_reconnect_locked(link);
            }
        }
    }

    /// Decide what follows a close: a timer, `Disconnected`, or `Closed`.
    fn schedule_reconnect_locked(&self, link: &mut LinkState) {
        let policy = &self.shared.policy;

        if !policy.enabled {
            link.state = ConnectionState::Disconnected;
            return;
        }

        if !policy.allows_attempt(link.attempts) {
            warn!(
                "[{}] Giving up after {} reconnect attempts",
                self.label(),
                link.attempts
            );
            link.state = ConnectionState::Closed;
            link.last_error = Some(StreamError::ReconnectExhausted {
                attempts: link.attempts,
                location: ErrorLocation::from(Location::caller()),
            });
            return;
        }

        link.cancel_timer();
        link.attempts += 1;

        let id = link.next_timer_id();
        let deadline = Instant::now() + policy.delay();
        let events = self.shared.events.clone();
        let task = self.shared.runtime.spawn(async move {
            sleep_until(deadline).await;
            let _ = events.send(LinkEvent::ReconnectDue { timer: id });
        });

        link.timer = Some(PendingTimer { id, task });
        link.state = ConnectionState::ReconnectScheduled;
        info!(
            "[{}] Reconnecting in {:?} (attempt {})",
            self.label(),
            policy.delay(),
            link.attempts
        );
    }
}
