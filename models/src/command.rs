//! Outbound command envelope.
//!
//! Commands are fire-and-forget: there is no correlation id and no
//! acknowledgement. Their effect shows up later as `state_change` or `log`
//! events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use std::fmt::{Display, Formatter, Result as FormatResult};
use std::str::FromStr;

const COMMAND_ENVELOPE_TYPE: &str = "command";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Continue,
    Pause,
    StepOver,
    StepInto,
    StepOut,
    Restart,
    Stop,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Continue,
        CommandKind::Pause,
        CommandKind::StepOver,
        CommandKind::StepInto,
        CommandKind::StepOut,
        CommandKind::Restart,
        CommandKind::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Continue => "continue",
            CommandKind::Pause => "pause",
            CommandKind::StepOver => "step_over",
            CommandKind::StepInto => "step_into",
            CommandKind::StepOut => "step_out",
            CommandKind::Restart => "restart",
            CommandKind::Stop => "stop",
        }
    }
}

impl Display for CommandKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| format!("Unknown command: {value}"))
    }
}

/// `{"type": "command", "command": <kind>, "params"?: {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundCommand {
    #[serde(rename = "type", with = "command_tag")]
    envelope: (),
    pub command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl OutboundCommand {
    pub fn new(command: CommandKind) -> Self {
        Self {
            envelope: (),
            command,
            params: None,
        }
    }

    pub fn with_params(command: CommandKind, params: Map<String, Value>) -> Self {
        Self {
            envelope: (),
            command,
            params: Some(params),
        }
    }
}

impl From<CommandKind> for OutboundCommand {
    fn from(command: CommandKind) -> Self {
        OutboundCommand::new(command)
    }
}

/// Serializes the unit envelope marker as the literal `"command"` and
/// rejects any other tag on the way back in.
mod command_tag {
    use super::COMMAND_ENVELOPE_TYPE;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(_: &(), serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(COMMAND_ENVELOPE_TYPE)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        if tag == COMMAND_ENVELOPE_TYPE {
            Ok(())
        } else {
            Err(D::Error::custom(format!(
                "expected envelope type '{COMMAND_ENVELOPE_TYPE}', got '{tag}'"
            )))
        }
    }
}
