//! Stdio transport tests against real `sh` child processes.

#![cfg(unix)]

use std::sync::Arc;

use mcp_probe::config::{HarnessConfig, StdioConfig};
use mcp_probe::filter::HeuristicClassifier;
use mcp_probe::harness::stdio::{run_stdio_suite, stdio_scenarios};
use mcp_probe::models::jsonrpc::{Request, RequestId};
use mcp_probe::stdio::spawn_server;
use mcp_probe::AppError;

/// Fake server: refuses to start outside stdio mode, logs to both streams,
/// and answers `initialize` and `tools/list` by method name.
const FAKE_SERVER: &str = r#"
[ "$MCP_STDIO_MODE" = "true" ] || { echo "not in stdio mode" >&2; exit 3; }
echo "[info] fake server starting" >&2
while IFS= read -r line; do
  case "$line" in
    *'"initialize"'*)
      echo '12:00:01 INFO handling initialize'
      echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake","version":"0.0.1"}}}'
      ;;
    *'"tools/list"'*)
      echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"Echo input"}]}}'
      ;;
  esac
done
"#;

fn sh_config(script: &str) -> StdioConfig {
    StdioConfig {
        command: Some("sh".into()),
        args: vec!["-c".into(), script.into()],
        startup_grace_ms: 200,
        read_timeout_ms: Some(5_000),
        ..StdioConfig::default()
    }
}

fn classifier() -> Arc<HeuristicClassifier> {
    Arc::new(HeuristicClassifier::new())
}

#[tokio::test]
async fn spawned_server_answers_in_order() {
    let mut transport = spawn_server(&sh_config(FAKE_SERVER), classifier())
        .await
        .expect("spawn");
    assert!(transport.pid().is_some());

    for scenario in stdio_scenarios("2024-11-05") {
        let response = transport.send(&scenario.request).await.expect("response");
        assert_eq!(response.id(), Some(scenario.request.id.clone()));
        assert!(response.is_success());
    }

    transport.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn stderr_is_captured_while_running() {
    let mut transport = spawn_server(&sh_config(FAKE_SERVER), classifier())
        .await
        .expect("spawn");

    transport
        .send(&Request::new(1_i64, "initialize", None))
        .await
        .expect("response");
    assert!(transport.stderr_text().contains("fake server starting"));

    transport.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn early_exit_is_startup_error_with_stderr() {
    let config = sh_config(r#"echo "fatal: missing api key" >&2; exit 1"#);

    let err = spawn_server(&config, classifier())
        .await
        .err()
        .expect("server exits during startup");
    match err {
        AppError::TransportStartup(msg) => {
            assert!(msg.contains("fatal: missing api key"), "got {msg}");
        }
        other => panic!("expected TransportStartup, got {other}"),
    }
}

#[tokio::test]
async fn missing_command_is_config_error() {
    let err = spawn_server(&StdioConfig::default(), classifier())
        .await
        .err()
        .expect("no command");
    assert!(matches!(err, AppError::Config(_)), "got {err}");
}

#[tokio::test]
async fn unknown_binary_is_startup_error() {
    let config = StdioConfig {
        command: Some("/nonexistent/mcp-server-binary".into()),
        ..StdioConfig::default()
    };
    let err = spawn_server(&config, classifier())
        .await
        .err()
        .expect("spawn fails");
    assert!(matches!(err, AppError::TransportStartup(_)), "got {err}");
}

#[tokio::test]
async fn silent_server_exhausts_budget() {
    let config = StdioConfig {
        max_read_attempts: 3,
        ..sh_config(r#"while IFS= read -r line; do echo "[debug] got it"; done"#)
    };
    let mut transport = spawn_server(&config, classifier()).await.expect("spawn");

    let err = transport
        .send(&Request::new(RequestId::Number(1), "tools/list", None))
        .await
        .expect_err("only log lines");
    assert!(matches!(err, AppError::NoResponse(_)), "got {err}");

    transport.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn stdio_suite_passes_against_fake_server() {
    let config = HarnessConfig {
        stdio: sh_config(FAKE_SERVER),
        ..HarnessConfig::default()
    };

    let report = run_stdio_suite(&config).await;
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.all_passed(), "outcomes: {:?}", report.outcomes);
}

#[tokio::test]
async fn stdio_suite_records_startup_failure() {
    let config = HarnessConfig {
        stdio: sh_config("exit 7"),
        ..HarnessConfig::default()
    };

    let report = run_stdio_suite(&config).await;
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].name, "startup");
    assert!(!report.all_passed());
}
