use crate::{DEBUG_FEATURE, EndpointBuilder, TargetId};

/// **VALUE**: Verifies text ids are kept verbatim even when they look numeric.
///
/// **BUG THIS CATCHES**: Would catch `"007"` being normalised to `7`, which
/// attaches the session to a different run than the one the user named.
#[test]
fn given_digit_string_when_converted_then_keeps_text() {
    assert_eq!(TargetId::from("007"), TargetId::Name("007".to_string()));
    assert_eq!(
        TargetId::from(String::from("42")),
        TargetId::Name("42".to_string())
    );
    assert_eq!("+12".parse::<TargetId>(), Ok(TargetId::Name("+12".to_string())));
}

/// **VALUE**: Verifies numeric-looking text ids reach the socket path unchanged.
///
/// **BUG THIS CATCHES**: Would catch the endpoint being derived from a
/// re-formatted number (`/7/` for `007`, `/12/` for `+12`).
#[test]
fn given_numeric_looking_text_when_building_endpoint_then_path_keeps_text() {
    for raw in ["007", "+12"] {
        // GIVEN: A builder targeting a text id
        let builder = EndpointBuilder::default()
            .with_host("dash:80")
            .with_feature(DEBUG_FEATURE)
            .with_target(TargetId::from(raw));

        // WHEN: Building
        let endpoint = builder.build().expect("endpoint should build");

        // THEN: The segment is exactly the text given
        let segment = format!("/api/debug/{raw}/ws");
        assert!(
            endpoint.url().as_str().ends_with(&segment),
            "{} should end with {segment}",
            endpoint.url()
        );
        assert_eq!(endpoint.target().to_string(), raw);
    }
}

/// **VALUE**: Verifies only real integers become numeric targets.
#[test]
fn given_integer_when_converted_then_produces_numeric_target() {
    assert_eq!(TargetId::from(42u64), TargetId::Numeric(42));
    assert_eq!(TargetId::from(42u64).to_string(), "42");
}

/// **VALUE**: Verifies other ids are kept verbatim.
#[test]
fn given_named_id_when_converted_then_keeps_name() {
    let target: TargetId = "deploy-7".parse().unwrap();

    assert_eq!(target, TargetId::Name("deploy-7".to_string()));
    assert_eq!(target.to_string(), "deploy-7");
    assert!(!target.is_empty());
}

/// **VALUE**: Verifies blank names count as empty.
#[test]
fn given_blank_name_when_checked_then_is_empty() {
    assert!(TargetId::from(" ").is_empty());
}
