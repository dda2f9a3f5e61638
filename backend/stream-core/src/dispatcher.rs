//! Inbound frame parsing and routing.
//!
//! A [`Dispatcher`] takes one raw text frame at a time, validates the
//! `{"type", "payload"}` envelope and hands the typed payload to the handler
//! registered for that type. Bad frames are logged and dropped; nothing that
//! arrives on the wire can make dispatch fail or panic into the caller.

use crate::error::frame::FrameError;

use common::ErrorLocation;
use models::{
    ErrorPayload, InboundEnvelope, InboundEvent, InboundKind, LogPayload, StateChangePayload,
};

use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::{Arc, Mutex, PoisonError};

use log::{error, trace, warn};
use serde_json::Value;

type LogHandler = Box<dyn FnMut(&LogPayload) + Send>;
type VariablesHandler = Box<dyn FnMut(&Value) + Send>;
type StateChangeHandler = Box<dyn FnMut(&StateChangePayload) + Send>;
type ErrorHandler = Box<dyn FnMut(&ErrorPayload) + Send>;

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Parsed and handed to its handler.
    Delivered,
    /// Parsed, but no handler is registered for its type.
    Unhandled,
    /// Valid envelope with a `type` this client does not know.
    UnknownType,
    /// Not JSON, not an envelope, or a payload of the wrong shape.
    Malformed,
}

/// Per-type callbacks. Every handler is optional; a missing one drops its
/// frames silently.
#[derive(Default)]
pub struct EventHandlers {
    log: Option<LogHandler>,
    variables: Option<VariablesHandler>,
    state_change: Option<StateChangeHandler>,
    error: Option<ErrorHandler>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_log(mut self, handler: impl FnMut(&LogPayload) + Send + 'static) -> Self {
        self.log = Some(Box::new(handler));
        self
    }

    pub fn on_variables(mut self, handler: impl FnMut(&Value) + Send + 'static) -> Self {
        self.variables = Some(Box::new(handler));
        self
    }

    pub fn on_state_change(
        mut self,
        handler: impl FnMut(&StateChangePayload) + Send + 'static,
    ) -> Self {
        self.state_change = Some(Box::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl FnMut(&ErrorPayload) + Send + 'static) -> Self {
        self.error = Some(Box::new(handler));
        self
    }
}

pub struct Dispatcher {
    handlers: EventHandlers,
    last_event: Arc<Mutex<Option<InboundEvent>>>,
    label: String,
}

impl Dispatcher {
    pub fn new(handlers: EventHandlers) -> Self {
        Self {
            handlers,
            last_event: Arc::new(Mutex::new(None)),
            label: "dispatcher".to_string(),
        }
    }

    /// Prefix for this dispatcher's log lines.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Parse one raw frame and route it.
    pub fn dispatch(&mut self, frame: &str) -> DispatchOutcome {
        match parse_frame(frame) {
            Ok(event) => {
                *self
                    .last_event
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(event.clone());
                self.route(&event)
            }
            Err(e @ FrameError::UnknownType { .. }) => {
                warn!("[{}] Dropping frame: {}", self.label, e);
                DispatchOutcome::UnknownType
            }
            Err(e) => {
                warn!("[{}] Dropping frame: {}", self.label, e);
                trace!("[{}] Dropped frame body: {}", self.label, frame);
                DispatchOutcome::Malformed
            }
        }
    }

    /// Hand an already decoded event to its handler.
    pub fn route(&mut self, event: &InboundEvent) -> DispatchOutcome {
        let kind = event.kind();
        let label = self.label.as_str();
        let delivered = match (event, &mut self.handlers) {
            (
                InboundEvent::Log(payload),
                EventHandlers {
                    log: Some(handler), ..
                },
            ) => guarded(label, kind, || handler(payload)),
            (
                InboundEvent::Variables(payload),
                EventHandlers {
                    variables: Some(handler),
                    ..
                },
            ) => guarded(label, kind, || handler(payload)),
            (
                InboundEvent::StateChange(payload),
                EventHandlers {
                    state_change: Some(handler),
                    ..
                },
            ) => guarded(label, kind, || handler(payload)),
            (
                InboundEvent::Error(payload),
                EventHandlers {
                    error: Some(handler),
                    ..
                },
            ) => guarded(label, kind, || handler(payload)),
            _ => false,
        };

        if delivered {
            DispatchOutcome::Delivered
        } else {
            trace!("[{}] No handler for '{}' event", label, kind);
            DispatchOutcome::Unhandled
        }
    }

    /// The most recent frame that parsed successfully, handled or not.
    pub fn last_event(&self) -> Option<InboundEvent> {
        self.last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn last_event_slot(&self) -> Arc<Mutex<Option<InboundEvent>>> {
        Arc::clone(&self.last_event)
    }
}

/// Decode a raw frame into a typed event.
///
/// # Errors
///
/// - [`FrameError::Malformed`] if the text is not a JSON envelope
/// - [`FrameError::UnknownType`] if the envelope's `type` is not recognised
/// - [`FrameError::Payload`] if the payload does not fit its type
pub fn parse_frame(frame: &str) -> Result<InboundEvent, FrameError> {
    let envelope: InboundEnvelope = serde_json::from_str(frame)?;

    let Some(kind) = InboundKind::from_tag(&envelope.kind) else {
        return Err(FrameError::UnknownType {
            kind: envelope.kind,
            location: ErrorLocation::from(Location::caller()),
        });
    };

    InboundEvent::decode(kind, envelope.payload).map_err(|e| FrameError::Payload {
        kind: kind.to_string(),
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })
}

/// Run a user handler, containing any panic to the one frame.
///
/// Returns `true` once the handler ran, even if it panicked.
fn guarded(label: &str, kind: InboundKind, handler: impl FnOnce()) -> bool {
    if panic::catch_unwind(AssertUnwindSafe(handler)).is_err() {
        error!("[{}] '{}' handler panicked; frame dropped", label, kind);
    }
    true
}
