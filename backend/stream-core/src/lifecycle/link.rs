use crate::error::stream::StreamError;
use crate::transport::{Socket, SocketId};

use models::ConnectionState;

use tokio::task::JoinHandle;

pub(super) struct LiveSocket {
    pub(super) id: SocketId,
    pub(super) handle: Box<dyn Socket>,
}

pub(super) struct PendingTimer {
    pub(super) id: u64,
    pub(super) task: JoinHandle<()>,
}

/// Mutable lifecycle state, only ever touched under the manager's lock.
#[derive(Default)]
pub(super) struct LinkState {
    pub(super) state: ConnectionState,
    pub(super) socket: Option<LiveSocket>,
    pub(super) timer: Option<PendingTimer>,
    pub(super) attempts: u32,
    pub(super) last_error: Option<StreamError>,
    /// Bumped by every `disconnect`.
    pub(super) epoch: u64,
    socket_seq: SocketId,
    timer_seq: u64,
}

impl LinkState {
    pub(super) fn next_socket_id(&mut self) -> SocketId {
        self.socket_seq += 1;
        self.socket_seq
    }

    pub(super) fn next_timer_id(&mut self) -> u64 {
        self.timer_seq += 1;
        self.timer_seq
    }

    /// Abort the pending timer, if any. Returns whether one was pending.
    ///
    /// A firing already queued on the event channel carries the old id and
    /// is rejected when it is handled.
    pub(super) fn cancel_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.task.abort();
                true
            }
            None => false,
        }
    }
}
