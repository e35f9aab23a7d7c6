use std::io::Write;

use mcp_probe::config::{HarnessConfig, IdMatching};
use mcp_probe::AppError;

fn sample_toml() -> &'static str {
    r#"
[stdio]
command = "sympy_mcp"
args = ["start"]
startup_grace_ms = 500
max_read_attempts = 20
read_timeout_ms = 3000
id_matching = "strict"
protocol_version = "2024-11-05"

[stdio.env]
RELEASE_COOKIE = "probe"

[http]
base_url = "http://127.0.0.1:9000/"
sse_path = "/events"
post_path = "/rpc"
protocol_version = "2025-06-18"
session_wait_seconds = 5
response_timeout_seconds = 15
connect_grace_ms = 250
request_timeout_seconds = 30
pause_between_ms = 0

[log]
markers = ["DEBUG:"]
"#
}

#[test]
fn parses_full_config() {
    let config = HarnessConfig::from_toml_str(sample_toml()).expect("config parses");

    assert_eq!(config.stdio.command.as_deref(), Some("sympy_mcp"));
    assert_eq!(config.stdio.args, vec!["start".to_owned()]);
    assert_eq!(config.stdio.max_read_attempts, 20);
    assert_eq!(config.stdio.id_matching, IdMatching::Strict);
    assert_eq!(
        config.stdio.read_timeout(),
        Some(std::time::Duration::from_millis(3000))
    );
    assert_eq!(
        config.stdio.env.get("RELEASE_COOKIE").map(String::as_str),
        Some("probe")
    );
    assert_eq!(config.http.sse_url(), "http://127.0.0.1:9000/events");
    assert_eq!(config.http.post_url(), "http://127.0.0.1:9000/rpc");
    assert_eq!(config.http.response_timeout_seconds, 15);
    assert_eq!(config.log.markers, vec!["DEBUG:".to_owned()]);
}

#[test]
fn empty_document_yields_defaults() {
    let config = HarnessConfig::from_toml_str("").expect("empty config parses");

    assert_eq!(config, HarnessConfig::default());
    assert_eq!(config.stdio.command, None);
    assert_eq!(config.stdio.max_read_attempts, 10);
    assert_eq!(config.stdio.id_matching, IdMatching::FirstJson);
    assert_eq!(config.stdio.read_timeout(), None);
    assert_eq!(config.http.base_url, "http://localhost:8081");
    assert_eq!(config.http.sse_url(), "http://localhost:8081/sse");
    assert_eq!(config.http.post_url(), "http://localhost:8081/");
    assert_eq!(config.http.protocol_version, "2025-06-18");
    assert_eq!(config.http.session_wait_seconds, 10);
    assert_eq!(config.http.response_timeout_seconds, 10);
}

#[test]
fn zero_attempt_budget_is_rejected() {
    let err = HarnessConfig::from_toml_str("[stdio]\nmax_read_attempts = 0\n")
        .expect_err("zero attempts must be rejected");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("max_read_attempts")));
}

#[test]
fn zero_response_timeout_is_rejected() {
    let err = HarnessConfig::from_toml_str("[http]\nresponse_timeout_seconds = 0\n")
        .expect_err("zero ceiling must be rejected");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn every_zero_ceiling_is_rejected_by_name() {
    for field in [
        "session_wait_seconds",
        "response_timeout_seconds",
        "request_timeout_seconds",
        "connect_grace_ms",
    ] {
        let err = HarnessConfig::from_toml_str(&format!("[http]\n{field} = 0\n"))
            .expect_err("zero ceiling must be rejected");
        assert!(
            matches!(err, AppError::Config(ref msg) if msg.contains(field)),
            "{field}: got {err}"
        );
    }
}

#[test]
fn non_http_base_url_is_rejected() {
    let err = HarnessConfig::from_toml_str("[http]\nbase_url = \"localhost:8081\"\n")
        .expect_err("scheme-less URL must be rejected");
    assert!(err.to_string().contains("base_url"));
}

#[test]
fn unknown_id_matching_is_a_config_error() {
    let err = HarnessConfig::from_toml_str("[stdio]\nid_matching = \"loose\"\n")
        .expect_err("unknown variant must be rejected");
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(sample_toml().as_bytes()).expect("write");

    let config = HarnessConfig::load_from_path(file.path()).expect("config loads");
    assert_eq!(config.http.connect_grace_ms, 250);
}

#[test]
fn missing_file_is_a_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = HarnessConfig::load_from_path(temp.path().join("absent.toml"))
        .expect_err("missing file must fail");
    assert!(matches!(err, AppError::Config(_)));
}
