use crate::config::{
    ENV_BASE_URL, ENV_HOST, ENV_MAX_ATTEMPTS, ENV_RECONNECT, ENV_RECONNECT_MS, ENV_SECURE,
    ReconnectPolicy, StreamConfig,
};
use crate::error::config::ConfigError;

use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

const ALL_ENV: [&str; 6] = [
    ENV_BASE_URL,
    ENV_HOST,
    ENV_SECURE,
    ENV_RECONNECT,
    ENV_RECONNECT_MS,
    ENV_MAX_ATTEMPTS,
];

fn clear_env() {
    for variable in ALL_ENV {
        // SAFETY: env tests are serialized with #[serial].
        unsafe { std::env::remove_var(variable) };
    }
}

fn set_env(variable: &str, value: &str) {
    // SAFETY: env tests are serialized with #[serial].
    unsafe { std::env::set_var(variable, value) };
}

/// **VALUE**: Verifies a missing config file yields the documented defaults.
///
/// **BUG THIS CATCHES**: Would catch a first run failing because
/// `stream.json` does not exist yet.
#[test]
fn given_empty_dir_when_load_then_returns_defaults() {
    // GIVEN: An empty config directory
    let dir = TempDir::new().expect("temp dir");

    // WHEN: Loading
    let config = StreamConfig::load(dir.path()).expect("load should succeed");

    // THEN: Defaults, including the 5 s unbounded reconnect policy
    assert_eq!(config, StreamConfig::default());
    assert!(config.reconnect.enabled);
    assert_eq!(config.reconnect.delay(), Duration::from_millis(5_000));
    assert_eq!(config.reconnect.max_attempts, None);
}

/// **VALUE**: Verifies save then load returns the same config.
#[test]
fn given_saved_config_when_load_then_values_survive() {
    // GIVEN: A config with every field changed
    let dir = TempDir::new().expect("temp dir");
    let mut config = StreamConfig::default();
    config.endpoint.base_url = Some("https://dash.example.com".to_string());
    config.endpoint.secure = true;
    config.reconnect = ReconnectPolicy::fixed(Duration::from_millis(1_500)).with_max_attempts(4);

    // WHEN: Saving and loading
    config.save(dir.path()).expect("save should succeed");
    let loaded = StreamConfig::load(dir.path()).expect("load should succeed");

    // THEN: Equal, and no temp file left behind
    assert_eq!(loaded, config);
    assert!(!dir.path().join("stream.json.tmp").exists());
}

/// **VALUE**: Verifies a corrupt file is an error, not silently defaulted.
///
/// **BUG THIS CATCHES**: Would catch a typo in `stream.json` quietly
/// pointing the console at the wrong host.
#[test]
fn given_corrupt_file_when_load_then_parse_error() {
    // GIVEN: A file that is not JSON
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("stream.json"), "{ not json").expect("write");

    // WHEN: Loading
    let result = StreamConfig::load(dir.path());

    // THEN: Parse error naming the file, which is left as it was
    match result {
        Err(ConfigError::ParseError { path, .. }) => {
            assert_eq!(path, dir.path().join("stream.json"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
    let contents = std::fs::read_to_string(dir.path().join("stream.json")).expect("read back");
    assert_eq!(contents, "{ not json");
}

/// **VALUE**: Verifies a well-formed file with out-of-range values is rejected.
///
/// **BUG THIS CATCHES**: Would catch `load` skipping validation, so a
/// hand-edited `delay_ms` of 5 spins the reconnect loop.
#[test]
fn given_out_of_range_file_when_load_then_validation_error() {
    // GIVEN: Valid JSON with a too-short reconnect delay
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("stream.json"),
        r#"{"reconnect":{"delay_ms":5}}"#,
    )
    .expect("write");

    // WHEN: Loading
    let result = StreamConfig::load(dir.path());

    // THEN: Validation error
    assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
}

/// **VALUE**: Verifies partial files fill the gaps with defaults.
#[test]
fn given_partial_file_when_load_then_missing_fields_defaulted() {
    // GIVEN: Only a host
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("stream.json"),
        r#"{"endpoint":{"host":"localhost:8080"}}"#,
    )
    .expect("write");

    // WHEN: Loading
    let config = StreamConfig::load(dir.path()).expect("load should succeed");

    // THEN: Host set, everything else default
    assert_eq!(config.endpoint.host.as_deref(), Some("localhost:8080"));
    assert_eq!(config.reconnect, ReconnectPolicy::default());
}

/// **VALUE**: Verifies reconnect bounds are enforced.
///
/// **BUG THIS CATCHES**: Would catch a zero delay turning a dead server
/// into a busy reconnect loop, or `max_attempts = 0` never connecting.
#[test]
fn given_out_of_range_policy_when_validate_then_error() {
    // GIVEN / WHEN / THEN: Delay too short
    let too_fast = ReconnectPolicy::fixed(Duration::from_millis(10));
    assert!(matches!(
        too_fast.validate(),
        Err(ConfigError::ValidationError { .. })
    ));

    // GIVEN / WHEN / THEN: Delay too long
    let too_slow = ReconnectPolicy::fixed(Duration::from_secs(3_600));
    assert!(too_slow.validate().is_err());

    // GIVEN / WHEN / THEN: Zero attempts
    let zero = ReconnectPolicy::default().with_max_attempts(0);
    assert!(zero.validate().is_err());

    // GIVEN / WHEN / THEN: Bounds themselves are fine
    assert!(ReconnectPolicy::fixed(Duration::from_millis(100)).validate().is_ok());
    assert!(ReconnectPolicy::fixed(Duration::from_secs(600)).validate().is_ok());
}

/// **VALUE**: Verifies the attempt budget arithmetic.
#[test]
fn given_policies_when_allows_attempt_then_respects_budget() {
    let unbounded = ReconnectPolicy::default();
    assert!(unbounded.allows_attempt(0));
    assert!(unbounded.allows_attempt(u32::MAX - 1));

    let bounded = ReconnectPolicy::default().with_max_attempts(3);
    assert!(bounded.allows_attempt(2));
    assert!(!bounded.allows_attempt(3));

    assert!(!ReconnectPolicy::disabled().allows_attempt(0));
}

/// **VALUE**: Verifies unsupported base URL schemes are rejected on load.
#[test]
fn given_ftp_base_url_when_validate_then_error() {
    // GIVEN: A config pointing at an ftp origin
    let mut config = StreamConfig::default();
    config.endpoint.base_url = Some("ftp://dash.example.com".to_string());

    // WHEN: Validating
    let result = config.validate();

    // THEN: Rejected
    assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
}

/// **VALUE**: Verifies environment variables override file values.
///
/// **BUG THIS CATCHES**: Would catch a deployment that sets
/// `DEBUG_STREAM_HOST` still connecting to the host from `stream.json`.
#[test]
#[serial]
fn given_env_vars_when_apply_overrides_then_values_replaced() {
    // GIVEN: File-level config and a full set of env overrides
    clear_env();
    let mut config = StreamConfig::default();
    config.endpoint.host = Some("file-host:1".to_string());
    set_env(ENV_HOST, "env-host:2");
    set_env(ENV_SECURE, "true");
    set_env(ENV_RECONNECT_MS, "2500");
    set_env(ENV_MAX_ATTEMPTS, "7");

    // WHEN: Applying overrides
    let result = config.apply_env_overrides();
    clear_env();

    // THEN: Env wins
    result.expect("overrides should apply");
    assert_eq!(config.endpoint.host.as_deref(), Some("env-host:2"));
    assert!(config.endpoint.secure);
    assert_eq!(config.reconnect.delay_ms, 2_500);
    assert_eq!(config.reconnect.max_attempts, Some(7));
}

/// **VALUE**: Verifies `unbounded` clears a max attempts value from file.
#[test]
#[serial]
fn given_unbounded_env_when_apply_overrides_then_max_attempts_cleared() {
    // GIVEN: A bounded file policy and an unbounded override
    clear_env();
    let mut config = StreamConfig::default();
    config.reconnect = config.reconnect.with_max_attempts(3);
    set_env(ENV_MAX_ATTEMPTS, "unbounded");
    set_env(ENV_RECONNECT, "off");

    // WHEN: Applying overrides
    let result = config.apply_env_overrides();
    clear_env();

    // THEN: Unbounded and disabled
    result.expect("overrides should apply");
    assert_eq!(config.reconnect.max_attempts, None);
    assert!(!config.reconnect.enabled);
}

/// **VALUE**: Verifies a malformed env value is reported, not ignored.
#[test]
#[serial]
fn given_invalid_env_value_when_apply_overrides_then_env_error() {
    // GIVEN: A non-numeric delay
    clear_env();
    let mut config = StreamConfig::default();
    set_env(ENV_RECONNECT_MS, "soon");

    // WHEN: Applying overrides
    let result = config.apply_env_overrides();
    clear_env();

    // THEN: EnvError naming the variable
    match result {
        Err(ConfigError::EnvError { variable, .. }) => assert_eq!(variable, ENV_RECONNECT_MS),
        other => panic!("Expected EnvError, got {other:?}"),
    }
}
