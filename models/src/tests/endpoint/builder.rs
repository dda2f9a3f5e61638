use crate::{DEBUG_FEATURE, DEPLOYMENT_LOGS_FEATURE, EndpointBuilder, ModelError, TargetId};

/// **VALUE**: Verifies the endpoint path convention `/api/<feature>/<target>/ws`.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Segments are reordered or the trailing `ws` segment is dropped
/// - The scheme is not derived from the `secure` flag
///
/// The server routes sockets purely on this path, so any drift means the
/// client silently connects to nothing.
#[test]
fn given_host_and_target_when_building_then_derives_socket_path() {
    // GIVEN: Builder with host, feature and numeric target
    let builder = EndpointBuilder::default()
        .with_host("localhost:8080")
        .with_feature(DEBUG_FEATURE)
        .with_target(42u64);

    // WHEN: Building
    let endpoint = builder.build().expect("endpoint should build");

    // THEN: URL follows the convention with the plain ws scheme
    assert_eq!(endpoint.url().as_str(), "ws://localhost:8080/api/debug/42/ws");
    assert_eq!(endpoint.feature(), "debug");
    assert_eq!(endpoint.target(), &TargetId::Numeric(42));
    assert!(!endpoint.is_secure());
}

/// **VALUE**: Verifies that an https dashboard origin yields a `wss` socket.
///
/// **BUG THIS CATCHES**: Would catch a mixed-content failure where a page
/// served over https tries to open an insecure `ws://` socket.
#[test]
fn given_https_base_url_when_building_then_uses_wss_scheme() {
    // GIVEN: An https dashboard origin with a path that must be ignored
    let builder = EndpointBuilder::default()
        .with_base_url("https://dashboard.example.com/console/runs")
        .with_feature(DEPLOYMENT_LOGS_FEATURE)
        .with_target("deploy-7");

    // WHEN: Building
    let endpoint = builder.build().expect("endpoint should build");

    // THEN: Secure socket on the same host
    assert_eq!(
        endpoint.url().as_str(),
        "wss://dashboard.example.com/api/deployments/deploy-7/ws"
    );
    assert!(endpoint.is_secure());
}

/// **VALUE**: Verifies that a plain http origin keeps its port and maps to `ws`.
#[test]
fn given_http_base_url_with_port_when_building_then_keeps_port() {
    // GIVEN: An http origin with explicit port
    let builder = EndpointBuilder::default()
        .with_base_url("http://127.0.0.1:3000")
        .with_feature(DEBUG_FEATURE)
        .with_target(7u64);

    // WHEN: Building
    let endpoint = builder.build().expect("endpoint should build");

    // THEN: Port survives the scheme change
    assert_eq!(endpoint.to_string(), "ws://127.0.0.1:3000/api/debug/7/ws");
}

/// **VALUE**: Verifies that string targets are percent-encoded as one segment.
///
/// **BUG THIS CATCHES**: Would catch a target like `a/b` escaping its segment
/// and turning into an extra path component on the server.
#[test]
fn given_target_with_reserved_characters_when_building_then_encodes_single_segment() {
    // GIVEN: A target id containing a slash and a space
    let builder = EndpointBuilder::default()
        .with_host("localhost")
        .with_feature(DEBUG_FEATURE)
        .with_target("run a/b");

    // WHEN: Building
    let endpoint = builder.build().expect("endpoint should build");

    // THEN: The target stays one segment
    assert_eq!(
        endpoint.url().as_str(),
        "ws://localhost/api/debug/run%20a%2Fb/ws"
    );
}

/// **VALUE**: Verifies that builder validation rejects a missing host.
#[test]
fn given_missing_host_when_building_then_returns_validation_error() {
    // GIVEN: Builder without host or base URL
    let builder = EndpointBuilder::default()
        .with_feature(DEBUG_FEATURE)
        .with_target(1u64);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    match result.unwrap_err() {
        ModelError::Validation { message, .. } => {
            assert_eq!(message, "Host or base URL is required");
        }
    }
}

/// **VALUE**: Verifies that builder validation rejects unsupported base URL schemes.
///
/// **BUG THIS CATCHES**: Would catch if `ftp://` or `file://` origins are
/// silently mapped onto a socket scheme.
#[test]
fn given_ftp_base_url_when_building_then_returns_validation_error() {
    // GIVEN: Builder with an ftp origin
    let builder = EndpointBuilder::default()
        .with_base_url("ftp://files.example.com")
        .with_feature(DEBUG_FEATURE)
        .with_target(1u64);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should name the scheme
    match result.unwrap_err() {
        ModelError::Validation { message, .. } => {
            assert_eq!(message, "Unsupported base URL scheme: ftp");
        }
    }
}

/// **VALUE**: Verifies that empty targets and features are rejected.
#[test]
fn given_empty_target_or_feature_when_building_then_returns_validation_error() {
    // GIVEN: One builder with a blank target, one with a slash in the feature
    let blank_target = EndpointBuilder::default()
        .with_host("localhost")
        .with_feature(DEBUG_FEATURE)
        .with_target("  ");
    let bad_feature = EndpointBuilder::default()
        .with_host("localhost")
        .with_feature("debug/extra")
        .with_target(1u64);

    // WHEN: Attempting to build both
    // THEN: Both fail validation
    assert!(blank_target.build().is_err(), "Blank target should be rejected");
    assert!(bad_feature.build().is_err(), "Feature with '/' should be rejected");
}

/// **VALUE**: Verifies the derivation is deterministic.
#[test]
fn given_same_inputs_when_building_twice_then_produces_equal_endpoints() {
    // GIVEN: The same builder configuration
    let builder = EndpointBuilder::default()
        .with_host("localhost:9000")
        .with_secure(true)
        .with_feature(DEBUG_FEATURE)
        .with_target(5u64);

    // WHEN: Building twice
    let first = builder.clone().build().expect("endpoint should build");
    let second = builder.build().expect("endpoint should build");

    // THEN: Endpoints are identical
    assert_eq!(first, second);
    assert_eq!(first.url().scheme(), "wss");
}
