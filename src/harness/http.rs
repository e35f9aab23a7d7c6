//! HTTP/SSE suite: handshake, tool listing, and one call per computational
//! tool, issued one at a time with a pause between requests.

use serde_json::json;
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::harness::{Scenario, ScenarioOutcome, SuiteReport};
use crate::http::SseSession;

/// Scenarios issued over HTTP/SSE, in order, with ids starting at 1.
#[must_use]
pub fn http_scenarios(protocol_version: &str) -> Vec<Scenario> {
    vec![
        Scenario::initialize(1, protocol_version),
        Scenario::tools_list(2),
        Scenario::tool_call(
            3,
            "sympy_solve",
            json!({"equation": "x**2 - 4", "variable": "x"}),
        ),
        Scenario::tool_call(4, "sympy_simplify", json!({"expression": "x**2 + 2*x + 1"})),
        Scenario::tool_call(
            5,
            "sympy_differentiate",
            json!({"expression": "x**2", "variable": "x"}),
        ),
        Scenario::tool_call(
            6,
            "sympy_integrate",
            json!({"expression": "x", "variable": "x"}),
        ),
        Scenario::tool_call(7, "sympy_expand", json!({"expression": "(x+1)**2"})),
        Scenario::tool_call(8, "sympy_factor", json!({"expression": "x**2 + 2*x + 1"})),
    ]
}

/// Connect, run `scenarios`, and close the session.
pub async fn run_http_suite(config: &HttpConfig, scenarios: &[Scenario]) -> SuiteReport {
    let mut report = SuiteReport::new("http");

    let session = match SseSession::connect(config).await {
        Ok(session) => session,
        Err(err) => {
            report.record(ScenarioOutcome::errored("connect", err));
            return report;
        }
    };

    match session.session_id() {
        Some(session_id) => info!(session_id, "http suite: connected"),
        None => warn!("http suite: connected without a session id"),
    }

    for (index, scenario) in scenarios.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(config.pause_between()).await;
        }
        info!(scenario = %scenario.name, id = %scenario.request.id, "http suite: sending");
        let result = session.send_request(&scenario.request).await;
        report.record(scenario.evaluate(result));
    }

    if let Err(err) = session.shutdown().await {
        warn!(%err, "http suite: session teardown failed");
    }
    report
}
