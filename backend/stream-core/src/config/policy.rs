use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
const MIN_RECONNECT_DELAY_MS: u64 = 100;
const MAX_RECONNECT_DELAY_MS: u64 = 600_000;

/// When and how often a dropped link is reopened.
///
/// The delay is a fixed interval between a close and the next attempt; it
/// does not grow. `max_attempts = None` retries forever. The attempt counter
/// resets whenever a socket reaches the open state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            delay_ms: default_delay_ms(),
            max_attempts: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

impl ReconnectPolicy {
    /// Unbounded retries at a fixed interval.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            enabled: true,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            max_attempts: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether another automatic attempt is allowed after `attempts` so far.
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        self.enabled && self.max_attempts.is_none_or(|max| attempts < max)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_RECONNECT_DELAY_MS..=MAX_RECONNECT_DELAY_MS).contains(&self.delay_ms) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid reconnect delay: {}ms (must be {}-{}ms)",
                    self.delay_ms, MIN_RECONNECT_DELAY_MS, MAX_RECONNECT_DELAY_MS
                ),
            });
        }

        if self.max_attempts == Some(0) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "max_attempts must be at least 1 when set".to_string(),
            });
        }

        Ok(())
    }
}
