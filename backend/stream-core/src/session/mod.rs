//! The public facade: one [`DebugSession`] per consumer and target.
//!
//! A session composes the lifecycle manager, the dispatcher and the command
//! channel. Server events reach the handlers registered on the
//! [`DebugSessionBuilder`]; commands go out through the helpers below and
//! report `false` whenever the link is not connected.
//!
//! Dropping a session disconnects it and stops its event pump.
//!
//! # Example
//!
//! ```no_run
//! use stream_core::{DebugSession, ReconnectPolicy};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), stream_core::CoreError> {
//! let session = DebugSession::builder(42u64)
//!     .with_base_url("https://dashboard.example.com")
//!     .with_reconnect_policy(ReconnectPolicy::fixed(Duration::from_secs(1)))
//!     .on_log(|log| println!("{}", log.message))
//!     .open()?;
//!
//! if !session.pause() {
//!     println!("not connected yet");
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
mod pump;

pub use builder::DebugSessionBuilder;

use crate::command::CommandChannel;
use crate::config::ReconnectPolicy;
use crate::error::stream::StreamError;
use crate::lifecycle::LifecycleManager;

use models::{CommandKind, ConnectionState, Endpoint, InboundEvent, OutboundCommand, TargetId};

use std::sync::{Arc, Mutex, PoisonError};

use log::info;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct DebugSession {
    id: Uuid,
    target: TargetId,
    lifecycle: LifecycleManager,
    commands: CommandChannel,
    last_event: Arc<Mutex<Option<InboundEvent>>>,
    pump: JoinHandle<()>,
    label: String,
}

impl DebugSession {
    pub fn builder(target: impl Into<TargetId>) -> DebugSessionBuilder {
        DebugSessionBuilder::new(target.into())
    }

    fn assemble(
        id: Uuid,
        target: TargetId,
        lifecycle: LifecycleManager,
        last_event: Arc<Mutex<Option<InboundEvent>>>,
        pump: JoinHandle<()>,
        label: String,
    ) -> Self {
        Self {
            id,
            target,
            commands: CommandChannel::new(lifecycle.clone(), label.clone()),
            lifecycle,
            last_event,
            pump,
            label,
        }
    }

    // ============================================
    // LIFECYCLE
    // ============================================

    /// Open the link. No-op while already connecting or connected.
    pub fn connect(&self) {
        self.lifecycle.connect();
    }

    /// Connect now, cancelling any scheduled reconnect.
    pub fn reconnect(&self) {
        self.lifecycle.reconnect();
    }

    /// Close the link for good. Idempotent.
    pub fn disconnect(&self) {
        self.lifecycle.disconnect();
    }

    // ============================================
    // QUERIES
    // ============================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.lifecycle.endpoint()
    }

    pub fn reconnect_policy(&self) -> &ReconnectPolicy {
        self.lifecycle.policy()
    }

    pub fn is_connected(&self) -> bool {
        self.lifecycle.state().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// The most recent transport failure, cleared on every successful open.
    pub fn connection_error(&self) -> Option<StreamError> {
        self.lifecycle.last_error()
    }

    /// Automatic attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.lifecycle.attempts()
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.lifecycle.has_pending_timer()
    }

    pub fn last_event(&self) -> Option<InboundEvent> {
        self.last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ============================================
    // COMMANDS
    // ============================================

    /// Write a command if connected. Never queues.
    pub fn send(&self, command: impl Into<OutboundCommand>) -> bool {
        self.commands.send(&command.into())
    }

    pub fn send_with_params(&self, kind: CommandKind, params: Map<String, Value>) -> bool {
        self.commands
            .send(&OutboundCommand::with_params(kind, params))
    }

    /// Write an arbitrary JSON frame under the same connected-only contract.
    pub fn send_json(&self, value: &Value) -> bool {
        self.commands.send_json(value)
    }

    pub fn pause(&self) -> bool {
        self.send(CommandKind::Pause)
    }

    pub fn continue_execution(&self) -> bool {
        self.send(CommandKind::Continue)
    }

    pub fn step_over(&self) -> bool {
        self.send(CommandKind::StepOver)
    }

    pub fn step_into(&self) -> bool {
        self.send(CommandKind::StepInto)
    }

    pub fn step_out(&self) -> bool {
        self.send(CommandKind::StepOut)
    }

    pub fn restart(&self) -> bool {
        self.send(CommandKind::Restart)
    }

    pub fn stop(&self) -> bool {
        self.send(CommandKind::Stop)
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        self.lifecycle.disconnect();
        self.pump.abort();
        info!("[{}] Session dropped", self.label);
    }
}
