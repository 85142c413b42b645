//! Unit tests for the JSONL protocol types.

use std::path::PathBuf;

use rstest::rstest;

use super::*;

#[test]
fn request_serialises_operation_and_path() {
    let request = PluginRequest::new(
        Operation::ComplexAnalysis,
        PathBuf::from("/inbox/ratelimits.xml"),
    );
    let json = serde_json::to_value(&request).expect("serialise");
    assert_eq!(json["operation"], "complex-analysis");
    assert_eq!(json["path"], "/inbox/ratelimits.xml");
}

#[test]
fn request_parses_from_wire_line() {
    let request: PluginRequest =
        serde_json::from_str(r#"{"operation":"history","path":"/inbox/ratehistory.xml"}"#)
            .expect("deserialise");
    assert_eq!(request.operation(), Operation::History);
    assert_eq!(request.path(), PathBuf::from("/inbox/ratehistory.xml"));
}

#[test]
fn success_response_omits_message() {
    let json = serde_json::to_string(&PluginResponse::success()).expect("serialise");
    assert_eq!(json, r#"{"success":true}"#);
}

#[rstest]
#[case::bare_success(r#"{"success":true}"#, true, None)]
#[case::noted_success(r#"{"success":true,"message":"stored 12 rows"}"#, true, Some("stored 12 rows"))]
#[case::failure(r#"{"success":false,"message":"bad root"}"#, false, Some("bad root"))]
fn response_parses(#[case] line: &str, #[case] success: bool, #[case] message: Option<&str>) {
    let response: PluginResponse = serde_json::from_str(line).expect("deserialise");
    assert_eq!(response.is_success(), success);
    assert_eq!(response.message(), message);
}

#[test]
fn failure_constructor_sets_message() {
    let response = PluginResponse::failure("schema mismatch");
    assert!(!response.is_success());
    assert_eq!(response.message(), Some("schema mismatch"));
}

#[test]
fn with_message_keeps_success_flag() {
    let response = PluginResponse::success().with_message("ok");
    assert!(response.is_success());
    assert_eq!(response.message(), Some("ok"));
}
