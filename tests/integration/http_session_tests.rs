//! HTTP/SSE session tests against an in-process mock server.

use std::time::Duration;

use serde_json::json;

use mcp_probe::harness::http::{http_scenarios, run_http_suite};
use mcp_probe::http::SseSession;
use mcp_probe::models::jsonrpc::RequestId;
use mcp_probe::AppError;

use super::test_helpers::{canned_response, test_config, unused_base_url, MockServer, Reply};

#[tokio::test]
async fn session_from_first_event_is_sent_as_header() {
    let server = MockServer::start(Reply::Sync, Some("abc123")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");

    assert_eq!(session.session_id().as_deref(), Some("abc123"));

    let response = session
        .send("tools/list", None, 2_i64)
        .await
        .expect("tools/list");
    assert!(response.is_success());

    let seen = server.state.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].session_id.as_deref(), Some("abc123"));
    assert_eq!(seen[0].protocol_version.as_deref(), Some("2025-06-18"));
    assert_eq!(seen[0].body["method"], "tools/list");
    assert!(seen[0].body.get("params").is_none());

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn sse_stream_request_carries_protocol_headers() {
    let server = MockServer::start(Reply::Sync, Some("hdr")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");

    let headers = server
        .state
        .sse_headers
        .lock()
        .unwrap()
        .clone()
        .expect("sse request seen");
    assert_eq!(
        headers.get("accept").and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
    assert_eq!(
        headers
            .get("mcp-protocol-version")
            .and_then(|v| v.to_str().ok()),
        Some("2025-06-18")
    );

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn accepted_request_resolves_from_sse_event() {
    let server = MockServer::start(Reply::Async, Some("s-202")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");

    let response = session
        .send(
            "tools/call",
            Some(json!({"name": "sympy_solve", "arguments": {"equation": "x**2 - 4"}})),
            4_i64,
        )
        .await
        .expect("async reply");

    assert_eq!(response.id(), Some(RequestId::Number(4)));
    assert_eq!(response.result().expect("result")["content"][0]["text"], "[-2, 2]");
    assert!(
        !session.responses().contains(&RequestId::Number(4)),
        "entry must be removed once claimed"
    );

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn accepted_request_without_event_times_out() {
    let server = MockServer::start(Reply::AsyncSilent, Some("s-silent")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");

    let err = session
        .send("tools/list", None, 5_i64)
        .await
        .expect_err("no SSE delivery");
    assert!(matches!(err, AppError::ResponseTimeout(_)), "got {err}");
    assert!(!session.responses().is_waiting(&RequestId::Number(5)));

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn ok_status_returns_body_directly() {
    let server = MockServer::start(Reply::Sync, Some("s-200")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");

    let response = session
        .send("initialize", Some(json!({"protocolVersion": "2025-06-18"})), 1_i64)
        .await
        .expect("sync reply");
    assert_eq!(
        response.result().expect("result")["serverInfo"]["name"],
        "mock-sympy"
    );
    assert!(!session.responses().contains(&RequestId::Number(1)));

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn ok_status_with_garbage_body_is_decode_error() {
    let server = MockServer::start(Reply::SyncGarbage, Some("s-bad")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");

    let err = session
        .send("tools/list", None, 2_i64)
        .await
        .expect_err("garbage body");
    match err {
        AppError::ProtocolDecode(msg) => assert!(msg.contains("<html>oops</html>")),
        other => panic!("expected ProtocolDecode, got {other}"),
    }

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn other_status_surfaces_code_and_body() {
    let server = MockServer::start(Reply::Reject, Some("s-500")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");

    let err = session
        .send("tools/list", None, 2_i64)
        .await
        .expect_err("500");
    match err {
        AppError::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected HttpStatus, got {other}"),
    }
    assert!(!session.responses().is_waiting(&RequestId::Number(2)));

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn later_session_event_does_not_replace_first() {
    let server = MockServer::start(Reply::Sync, Some("first")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");

    server
        .state
        .push_event("endpoint", &json!({"session_id": "second"}));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(session.session_id().as_deref(), Some("first"));
    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn unsolicited_response_is_stored_for_later_claim() {
    let server = MockServer::start(Reply::Sync, Some("s-store")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");

    server.state.push_event(
        "message",
        &canned_response(&json!({"id": 42, "method": "tools/list"})),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stored = session
        .responses()
        .take(&RequestId::Number(42))
        .expect("stored response");
    assert!(stored.result().is_some());
    assert!(session.responses().take(&RequestId::Number(42)).is_none());

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn request_without_session_omits_header() {
    let server = MockServer::start(Reply::Sync, None).await;
    let mut config = server.config();
    config.connect_grace_ms = 50;
    let session = SseSession::connect(&config).await.expect("connect");
    assert!(session.session_id().is_none());

    let response = session
        .send("tools/list", None, 2_i64)
        .await
        .expect("sent without session");
    assert!(response.is_success());

    let seen = server.state.seen();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].session_id.is_none());

    session.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn connect_to_missing_sse_path_is_connection_error() {
    let server = MockServer::start(Reply::Sync, Some("x")).await;
    let mut config = server.config();
    config.sse_path = "/nowhere".into();

    let err = SseSession::connect(&config)
        .await
        .err()
        .expect("404 must fail connect");
    assert!(matches!(err, AppError::Connection(_)), "got {err}");
}

#[tokio::test]
async fn connect_refused_is_connection_error() {
    let config = test_config(&unused_base_url().await);

    let err = SseSession::connect(&config)
        .await
        .err()
        .expect("refused must fail connect");
    assert!(matches!(err, AppError::Connection(_)), "got {err}");
}

#[tokio::test]
async fn shutdown_stops_reader_while_stream_is_open() {
    let server = MockServer::start(Reply::Sync, Some("s-stop")).await;
    let session = SseSession::connect(&server.config()).await.expect("connect");
    assert!(session.is_reader_running());

    tokio::time::timeout(Duration::from_secs(2), session.shutdown())
        .await
        .expect("shutdown must not hang")
        .expect("shutdown");
}

#[tokio::test]
async fn full_http_suite_passes_against_async_server() {
    let server = MockServer::start(Reply::Async, Some("suite")).await;
    let config = server.config();

    let scenarios = http_scenarios(&config.protocol_version);
    assert_eq!(scenarios.len(), 8);

    let report = run_http_suite(&config, &scenarios).await;
    assert_eq!(report.passed(), 8, "outcomes: {:?}", report.outcomes);
    assert!(report.all_passed());

    let ids: Vec<_> = server
        .state
        .seen()
        .iter()
        .map(|r| r.body["id"].as_i64().expect("numeric id"))
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[tokio::test]
async fn http_suite_records_connect_failure() {
    let config = test_config(&unused_base_url().await);
    let report = run_http_suite(&config, &http_scenarios(&config.protocol_version)).await;

    assert!(!report.all_passed());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].name, "connect");
}
