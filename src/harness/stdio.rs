//! Stdio suite: `initialize` then `tools/list` against a spawned server.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::filter::HeuristicClassifier;
use crate::harness::{Scenario, ScenarioOutcome, SuiteReport};
use crate::stdio::{spawn_server, StdioTransport};

/// Scenarios issued over stdio, in order.
#[must_use]
pub fn stdio_scenarios(protocol_version: &str) -> Vec<Scenario> {
    vec![
        Scenario::initialize(1, protocol_version),
        Scenario::tools_list(2),
    ]
}

/// Launch the configured server, run the stdio suite, and tear it down.
pub async fn run_stdio_suite(config: &HarnessConfig) -> SuiteReport {
    let mut report = SuiteReport::new("stdio");
    let classifier =
        Arc::new(HeuristicClassifier::new().with_markers(config.log.markers.iter().cloned()));

    let mut transport = match spawn_server(&config.stdio, classifier).await {
        Ok(transport) => transport,
        Err(err) => {
            report.record(ScenarioOutcome::errored("startup", err));
            return report;
        }
    };

    info!(pid = ?transport.pid(), "stdio suite: server ready");
    run_scenarios(
        &mut transport,
        &stdio_scenarios(&config.stdio.protocol_version),
        &mut report,
    )
    .await;

    if let Err(err) = transport.shutdown().await {
        warn!(%err, "stdio suite: server teardown failed");
    }
    report
}

/// Issue each scenario over an already running transport.
pub async fn run_scenarios(
    transport: &mut StdioTransport,
    scenarios: &[Scenario],
    report: &mut SuiteReport,
) {
    for scenario in scenarios {
        info!(scenario = %scenario.name, id = %scenario.request.id, "stdio suite: sending");
        let result = transport.send(&scenario.request).await;
        report.record(scenario.evaluate(result));
    }
}
