//! Inbound event envelopes.
//!
//! Every server frame is `{"type": <tag>, "payload": <type-specific>}`.
//! Decoding is two-phase: the envelope is read with an untyped payload
//! first, so that an unknown tag can be told apart from a malformed frame,
//! and only then is the payload decoded into its typed form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use std::fmt::{Display, Formatter, Result as FormatResult};

/// Raw envelope with the payload left undecoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    Log,
    Variables,
    StateChange,
    Error,
}

impl InboundKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "log" => Some(InboundKind::Log),
            "variables" => Some(InboundKind::Variables),
            "state_change" => Some(InboundKind::StateChange),
            "error" => Some(InboundKind::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InboundKind::Log => "log",
            InboundKind::Variables => "variables",
            InboundKind::StateChange => "state_change",
            InboundKind::Error => "error",
        }
    }
}

impl Display for InboundKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

/// A decoded server event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Log(LogPayload),
    Variables(Value),
    StateChange(StateChangePayload),
    Error(ErrorPayload),
}

impl InboundEvent {
    pub fn kind(&self) -> InboundKind {
        match self {
            InboundEvent::Log(_) => InboundKind::Log,
            InboundEvent::Variables(_) => InboundKind::Variables,
            InboundEvent::StateChange(_) => InboundKind::StateChange,
            InboundEvent::Error(_) => InboundKind::Error,
        }
    }

    /// Decode the payload of an envelope whose tag has already been recognised.
    pub fn decode(kind: InboundKind, payload: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            InboundKind::Log => InboundEvent::Log(serde_json::from_value(payload)?),
            InboundKind::Variables => InboundEvent::Variables(payload),
            InboundKind::StateChange => {
                InboundEvent::StateChange(serde_json::from_value(payload)?)
            }
            InboundKind::Error => InboundEvent::Error(serde_json::from_value(payload)?),
        })
    }
}

// ============================================
// LOG
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLog")]
pub struct LogPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogPayload {
    pub fn line(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
            timestamp: None,
            fields: Map::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLog {
    Line(String),
    Record {
        #[serde(default)]
        message: String,
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        timestamp: Option<Value>,
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
}

impl From<RawLog> for LogPayload {
    fn from(raw: RawLog) -> Self {
        match raw {
            RawLog::Line(message) => LogPayload::line(message),
            RawLog::Record {
                message,
                level,
                timestamp,
                fields,
            } => LogPayload {
                message,
                level,
                timestamp,
                fields,
            },
        }
    }
}

// ============================================
// STATE CHANGE
// ============================================

/// Execution state reported by the debugged target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    Running,
    Paused,
    Stopped,
    Completed,
    Other,
}

impl From<&str> for ExecutionState {
    fn from(state: &str) -> Self {
        match state {
            "running" => ExecutionState::Running,
            "paused" => ExecutionState::Paused,
            "stopped" => ExecutionState::Stopped,
            "completed" => ExecutionState::Completed,
            _ => ExecutionState::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStateChange")]
pub struct StateChangePayload {
    pub state: String,
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

impl StateChangePayload {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            detail: Map::new(),
        }
    }

    pub fn execution_state(&self) -> ExecutionState {
        ExecutionState::from(self.state.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStateChange {
    Bare(String),
    Detailed {
        state: String,
        #[serde(flatten)]
        detail: Map<String, Value>,
    },
}

impl From<RawStateChange> for StateChangePayload {
    fn from(raw: RawStateChange) -> Self {
        match raw {
            RawStateChange::Bare(state) => StateChangePayload::new(state),
            RawStateChange::Detailed { state, detail } => StateChangePayload { state, detail },
        }
    }
}

// ============================================
// ERROR
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawError")]
pub struct ErrorPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawError {
    Bare(String),
    Detailed {
        #[serde(default)]
        message: String,
        #[serde(default)]
        code: Option<Value>,
        #[serde(flatten)]
        detail: Map<String, Value>,
    },
}

impl From<RawError> for ErrorPayload {
    fn from(raw: RawError) -> Self {
        match raw {
            RawError::Bare(message) => ErrorPayload {
                message,
                code: None,
                detail: Map::new(),
            },
            RawError::Detailed {
                message,
                code,
                detail,
            } => ErrorPayload {
                message,
                code,
                detail,
            },
        }
    }
}
