use tps_core::errors::{ErrorInfo, TpsError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("replica", "r1")
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = TpsError::Config(sample_info("malformed-pairs", "odd flat list"));
    assert_eq!(err.code(), "malformed-pairs");
    assert!(err.info().context.contains_key("replica"));
}

#[test]
fn selection_error_surface() {
    let err = TpsError::empty_selection("ForwardShootMover");
    assert_eq!(err.code(), "empty-selection");
    assert_eq!(
        err.info().context.get("mover").map(String::as_str),
        Some("ForwardShootMover")
    );
    assert!(err.info().hint.is_some());
}

#[test]
fn invariant_error_surface() {
    let err = TpsError::Invariant(sample_info("multiple-active-samples", "two samples"));
    assert_eq!(err.code(), "multiple-active-samples");
}

#[test]
fn display_includes_context_and_hint() {
    let err = TpsError::Engine(
        ErrorInfo::new("E001", "engine stalled")
            .with_context("frames", "3")
            .with_hint("lower dt"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("engine error: engine stalled (code: E001)"));
    assert!(rendered.contains("frames=3"));
    assert!(rendered.ends_with("hint: lower dt"));
}

#[test]
fn errors_round_trip_json() {
    let err = TpsError::Serde(sample_info("S001", "schema mismatch"));
    let json = serde_json::to_string(&err).expect("serialize");
    assert!(json.contains("\"family\":\"Serde\""));
    let decoded: TpsError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, err);
}
