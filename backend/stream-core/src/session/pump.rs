use crate::dispatcher::Dispatcher;
use crate::lifecycle::{LifecycleManager, LinkEvent, Notice};
use crate::transport::CloseInfo;

use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, trace};
use tokio::sync::mpsc::UnboundedReceiver;

type ConnectHandler = Box<dyn FnMut() + Send>;
type DisconnectHandler = Box<dyn FnMut(&CloseInfo) + Send>;

/// Callbacks for link transitions, as opposed to server events.
#[derive(Default)]
pub(crate) struct LinkHandlers {
    pub(crate) on_connect: Option<ConnectHandler>,
    pub(crate) on_disconnect: Option<DisconnectHandler>,
}

/// Apply every link event in arrival order, then notify the consumer.
///
/// The lifecycle lock is released before any callback runs, so callbacks
/// may query or command the session. Notices decided before a
/// `disconnect()` are dropped instead of delivered.
pub(crate) async fn run_event_pump(
    lifecycle: LifecycleManager,
    mut events: UnboundedReceiver<LinkEvent>,
    mut dispatcher: Dispatcher,
    mut handlers: LinkHandlers,
    label: String,
) {
    debug!("[{}] Event pump started", label);

    while let Some(event) = events.recv().await {
        let Some(delivery) = lifecycle.handle_event(event) else {
            continue;
        };

        lifecycle.deliver(delivery, |notice| match notice {
            Notice::Connected => {
                if let Some(on_connect) = handlers.on_connect.as_mut() {
                    guarded(&label, "on_connect", || on_connect());
                }
            }
            Notice::Disconnected(info) => {
                if let Some(on_disconnect) = handlers.on_disconnect.as_mut() {
                    guarded(&label, "on_disconnect", || on_disconnect(&info));
                }
            }
            Notice::Frame(frame) => {
                let outcome = dispatcher.dispatch(&frame);
                trace!("[{}] Frame dispatched: {:?}", label, outcome);
            }
        });
    }

    debug!("[{}] Event pump stopped", label);
}

fn guarded(label: &str, name: &str, callback: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!("[{}] {} handler panicked", label, name);
    }
}
