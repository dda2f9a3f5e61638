pub mod policy;

pub use policy::ReconnectPolicy;

use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::{Path, PathBuf};

use const_format::concatcp;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "stream.json";
const CONFIG_VERSION: u32 = 1;

const ENV_PREFIX: &str = "DEBUG_STREAM_";
pub const ENV_BASE_URL: &str = concatcp!(ENV_PREFIX, "BASE_URL");
pub const ENV_HOST: &str = concatcp!(ENV_PREFIX, "HOST");
pub const ENV_SECURE: &str = concatcp!(ENV_PREFIX, "SECURE");
pub const ENV_RECONNECT: &str = concatcp!(ENV_PREFIX, "RECONNECT");
pub const ENV_RECONNECT_MS: &str = concatcp!(ENV_PREFIX, "RECONNECT_MS");
pub const ENV_MAX_ATTEMPTS: &str = concatcp!(ENV_PREFIX, "MAX_ATTEMPTS");

// ============================================
// CONFIG STRUCTS
// ============================================

/// Where the dashboard lives. The socket endpoint is derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Dashboard origin (`http(s)://` or `ws(s)://`); wins over `host`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bare `host[:port]`, used when no base URL is set.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            endpoint: EndpointConfig::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

// ============================================
// IMPLEMENTATION
// ============================================

impl StreamConfig {
    /// Load config from {config_dir}/stream.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(StreamConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file {}: {}", config_path.display(), e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: StreamConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Corrupt config file {}: {}", config_path.display(), e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Err(e) = config.validate() {
            warn!("Rejecting config file {}: {}", config_path.display(), e);
            return Err(e);
        }

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/stream.json using atomic write.
    ///
    /// Uses temp file + rename so a crash never leaves a half-written file.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if let Some(ref url) = self.endpoint.base_url {
            if url.is_empty() {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: "base_url cannot be empty string".to_string(),
                });
            }

            let supported = ["http://", "https://", "ws://", "wss://"];
            if !supported.iter().any(|scheme| url.starts_with(scheme)) {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: format!("Invalid URL format: {}", url),
                });
            }
        }

        if let Some(ref host) = self.endpoint.host {
            if host.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::from(Location::caller()),
                    reason: "host cannot be empty string".to_string(),
                });
            }
        }

        self.reconnect.validate()
    }

    /// Overlay `DEBUG_STREAM_*` environment variables onto this config.
    ///
    /// Unset variables leave the current value alone. A variable that is set
    /// but unparseable is an error rather than being silently ignored.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(base_url) = read_env(ENV_BASE_URL) {
            self.endpoint.base_url = Some(base_url);
        }

        if let Some(host) = read_env(ENV_HOST) {
            self.endpoint.host = Some(host);
        }

        if let Some(secure) = read_env(ENV_SECURE) {
            self.endpoint.secure = parse_flag(ENV_SECURE, &secure)?;
        }

        if let Some(enabled) = read_env(ENV_RECONNECT) {
            self.reconnect.enabled = parse_flag(ENV_RECONNECT, &enabled)?;
        }

        if let Some(delay) = read_env(ENV_RECONNECT_MS) {
            self.reconnect.delay_ms = delay.parse().map_err(|e| ConfigError::EnvError {
                location: ErrorLocation::from(Location::caller()),
                variable: ENV_RECONNECT_MS.to_string(),
                reason: format!("'{delay}' is not a number of milliseconds: {e}"),
            })?;
        }

        if let Some(max) = read_env(ENV_MAX_ATTEMPTS) {
            self.reconnect.max_attempts = match max.as_str() {
                "" | "none" | "unbounded" => None,
                value => Some(value.parse().map_err(|e| ConfigError::EnvError {
                    location: ErrorLocation::from(Location::caller()),
                    variable: ENV_MAX_ATTEMPTS.to_string(),
                    reason: format!("'{value}' is not an attempt count: {e}"),
                })?),
            };
        }

        self.validate()
    }
}

/// Attempts to load .env from the current directory or the executable's directory.
///
/// Returns the path that was loaded, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {:?}", path);
        return Some(path);
    }

    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))?;
    let env_path = exe_dir.join(".env");
    if !env_path.exists() {
        debug!("No .env file found");
        return None;
    }

    match dotenvy::from_path(&env_path) {
        Ok(_) => {
            info!("Loaded .env from: {:?}", env_path);
            Some(env_path)
        }
        Err(e) => {
            warn!("Failed to parse .env at {:?}: {}", env_path, e);
            None
        }
    }
}

fn read_env(variable: &str) -> Option<String> {
    env::var(variable).ok().map(|value| value.trim().to_string())
}

#[track_caller]
fn parse_flag(variable: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::EnvError {
            location: ErrorLocation::from(Location::caller()),
            variable: variable.to_string(),
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}
