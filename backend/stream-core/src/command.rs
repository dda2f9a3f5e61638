//! Connected-only command delivery.
//!
//! Commands are serialized and written straight to the live socket. Nothing
//! is queued: while the link is not `Connected` every send reports `false`
//! and the command is gone.

use crate::lifecycle::LifecycleManager;

use models::OutboundCommand;

use log::{debug, error};
use serde_json::Value;

#[derive(Clone)]
pub(crate) struct CommandChannel {
    lifecycle: LifecycleManager,
    label: String,
}

impl CommandChannel {
    pub(crate) fn new(lifecycle: LifecycleManager, label: String) -> Self {
        Self { lifecycle, label }
    }

    /// Returns `true` only if the link is connected and the transport
    /// accepted the frame.
    pub(crate) fn send(&self, command: &OutboundCommand) -> bool {
        match serde_json::to_string(command) {
            Ok(frame) => self.write(frame, command.command.as_str()),
            Err(e) => {
                error!("[{}] Failed to serialize command: {}", self.label, e);
                false
            }
        }
    }

    /// Raw JSON frame under the same contract as [`send`](Self::send).
    pub(crate) fn send_json(&self, value: &Value) -> bool {
        self.write(value.to_string(), "raw frame")
    }

    fn write(&self, frame: String, what: &str) -> bool {
        let accepted = self.lifecycle.write_text(frame);
        if accepted {
            debug!("[{}] Sent {}", self.label, what);
        } else {
            debug!(
                "[{}] Not sent ({}): link is {}",
                self.label,
                what,
                self.lifecycle.state()
            );
        }
        accepted
    }
}
