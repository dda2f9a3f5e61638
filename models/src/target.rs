use serde::{Deserialize, Serialize};

use std::convert::Infallible;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::str::FromStr;

/// Identifier of the entity a session streams from (a debug run, a
/// deployment). The server accepts either numeric or string ids.
///
/// Text is never reinterpreted as a number: `"007"` stays `"007"` on the
/// wire. Only [`From<u64>`] yields [`TargetId::Numeric`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetId {
    Numeric(u64),
    Name(String),
}

impl TargetId {
    pub fn is_empty(&self) -> bool {
        match self {
            TargetId::Numeric(_) => false,
            TargetId::Name(name) => name.trim().is_empty(),
        }
    }
}

impl Display for TargetId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            TargetId::Numeric(id) => write!(formatter, "{id}"),
            TargetId::Name(name) => formatter.write_str(name),
        }
    }
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        TargetId::Numeric(id)
    }
}

impl From<&str> for TargetId {
    fn from(name: &str) -> Self {
        TargetId::Name(name.to_string())
    }
}

impl From<String> for TargetId {
    fn from(name: String) -> Self {
        TargetId::Name(name)
    }
}

impl FromStr for TargetId {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(TargetId::from(value))
    }
}
