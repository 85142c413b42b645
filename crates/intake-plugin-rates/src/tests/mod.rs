//! Unit tests for the rates plugin request handler.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use intake_plugins::{Operation, PluginRequest, PluginResponse};
use rstest::rstest;
use tempfile::NamedTempFile;

use crate::{
    DEFAULT_DELAY, RatesAdapter, RatesAdapterError, SimulatedRatesAdapter, parse_delay,
    run_with_adapter,
};

struct StubAdapter {
    reject: bool,
}

impl RatesAdapter for StubAdapter {
    fn process(&self, operation: Operation, path: &Path) -> Result<String, RatesAdapterError> {
        if self.reject {
            return Err(RatesAdapterError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        Ok(format!("{operation}:{}", path.display()))
    }
}

fn request_line(operation: Operation, path: &Path) -> String {
    let request = PluginRequest::new(operation, path.to_path_buf());
    let mut line = serde_json::to_string(&request).expect("serialise request");
    line.push('\n');
    line
}

fn run_stub(input: &str, reject: bool) -> PluginResponse {
    let mut stdin = Cursor::new(input.as_bytes().to_vec());
    let mut stdout = Vec::new();
    run_with_adapter(&mut stdin, &mut stdout, &StubAdapter { reject }).expect("dispatch");
    let text = String::from_utf8(stdout).expect("utf8 output");
    assert!(text.ends_with('\n'), "response must be newline terminated");
    serde_json::from_str(text.trim()).expect("valid response")
}

#[rstest]
#[case::history(Operation::History)]
#[case::security(Operation::Security)]
#[case::complex(Operation::ComplexAnalysis)]
fn successful_operation_reports_summary(#[case] operation: Operation) {
    let path = PathBuf::from("/inbox/ratelimits.xml");
    let response = run_stub(&request_line(operation, &path), false);

    assert!(response.is_success());
    assert_eq!(
        response.message(),
        Some(format!("{operation}:/inbox/ratelimits.xml").as_str())
    );
}

#[test]
fn adapter_rejection_becomes_failure_response() {
    let path = PathBuf::from("/inbox/ratehistory.xml");
    let response = run_stub(&request_line(Operation::History, &path), true);

    assert!(!response.is_success());
    assert!(
        response
            .message()
            .is_some_and(|text| text.contains("/inbox/ratehistory.xml")),
        "unexpected response: {response:?}"
    );
}

#[rstest]
#[case::empty("", "empty")]
#[case::garbage("not json\n", "invalid plugin request JSON")]
#[case::unknown_operation(
    "{\"operation\":\"rename\",\"path\":\"/inbox/a.xml\"}\n",
    "invalid plugin request JSON"
)]
fn malformed_requests_yield_failure(#[case] input: &str, #[case] needle: &str) {
    let response = run_stub(input, false);

    assert!(!response.is_success());
    assert!(
        response.message().is_some_and(|text| text.contains(needle)),
        "unexpected response: {response:?}"
    );
}

#[rstest]
#[case::unset(None, DEFAULT_DELAY)]
#[case::blank(Some("  "), DEFAULT_DELAY)]
#[case::zero(Some("0"), Duration::ZERO)]
#[case::explicit(Some("250"), Duration::from_millis(250))]
fn parse_delay_accepts_valid_values(#[case] raw: Option<&str>, #[case] expected: Duration) {
    assert_eq!(parse_delay(raw).expect("valid delay"), expected);
}

#[test]
fn parse_delay_rejects_non_numeric_values() {
    let error = parse_delay(Some("soon")).expect_err("invalid delay");
    assert!(matches!(error, RatesAdapterError::InvalidDelay { ref value, .. } if value == "soon"));
}

#[test]
fn simulated_adapter_processes_existing_file() {
    let file = NamedTempFile::new().expect("temp file");
    let adapter = SimulatedRatesAdapter::new(Duration::ZERO);

    let summary = adapter
        .process(Operation::Security, file.path())
        .expect("processing succeeds");

    assert!(summary.starts_with("security completed"));
}

#[test]
fn simulated_adapter_rejects_missing_file() {
    let adapter = SimulatedRatesAdapter::new(Duration::ZERO);

    let error = adapter
        .process(Operation::History, Path::new("/nonexistent/ratehistory.xml"))
        .expect_err("missing file fails");

    assert!(matches!(error, RatesAdapterError::MissingFile { .. }));
}
